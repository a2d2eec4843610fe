#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
mod cards;
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
mod nav;
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
mod photos;
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
mod spring;
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
mod trail;

#[cfg(not(target_arch = "wasm32"))]
mod backend;
#[cfg(target_arch = "wasm32")]
mod frontend;

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    backend::init_logging();
    backend::run().await
}

#[cfg(target_arch = "wasm32")]
fn main() {
    frontend::run();
}
