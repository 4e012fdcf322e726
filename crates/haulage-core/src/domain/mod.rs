//! Domain types shared by the fetchers and pipelines.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ReportWindow`] | 7-day ad-report window ending yesterday |
//! | [`OrderRecord`] | one order node with its attached line items |

mod models;
mod window;

pub use models::OrderRecord;
pub use window::ReportWindow;
