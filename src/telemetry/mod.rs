pub mod config;
pub mod ctx;
pub mod emit;
pub mod ops;

use ctx::LogCtx;

pub fn init() -> LogCtx<ops::init::Init> { LogCtx::new() }
pub fn view() -> LogCtx<ops::view::View> { LogCtx::new() }
pub fn page() -> LogCtx<ops::page::Page> { LogCtx::new() }
pub fn mutate() -> LogCtx<ops::mutate::Mutate> { LogCtx::new() }
pub fn live() -> LogCtx<ops::live::Live> { LogCtx::new() }
pub fn poll() -> LogCtx<ops::poll::Poll> { LogCtx::new() }
