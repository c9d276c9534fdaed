use anyhow::Context;
use seriously_fish_core::App;

fn main() {
    if let Err(err) = run() {
        eprintln!("seriously-fish-adapter-axum failed: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    tidewater_adapter_axum::run_app::<App>(include_str!("../../../tidewater.toml"))
        .context("dev server")
}
