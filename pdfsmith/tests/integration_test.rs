#[path = "integration/common/mod.rs"]
mod common;

#[path = "integration/strategy_selection.rs"]
mod strategy_selection;

#[path = "integration/dry_run.rs"]
mod dry_run;

#[path = "integration/batch.rs"]
mod batch;

#[path = "integration/page_tools.rs"]
mod page_tools;
