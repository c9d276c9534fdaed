#![cfg_attr(target_arch = "wasm32", no_main)]

#[cfg(target_arch = "wasm32")]
use seriously_fish_core::App;
#[cfg(target_arch = "wasm32")]
use worker::*;

#[cfg(target_arch = "wasm32")]
#[event(fetch)]
pub async fn main(req: Request, env: Env, ctx: Context) -> Result<Response> {
    tidewater_adapter_cloudflare::run_app_with_manifest::<App>(
        include_str!("../../../tidewater.toml"),
        req,
        env,
        ctx,
    )
    .await
}
