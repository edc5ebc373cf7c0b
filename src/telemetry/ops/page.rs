use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Page;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Load, Watch, Output }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Load => "load",
        Phase::Watch => "watch",
        Phase::Output => "output",
    }}
    fn span(&self) -> Span { match self {
        Phase::Load => info_span!("load"),
        Phase::Watch => info_span!("watch"),
        Phase::Output => info_span!("output"),
    }}
}

impl OpMarker for Page {
    const NAME: &'static str = "page";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("page") }
}
