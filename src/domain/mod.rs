//! Domain types shared by the HTTP layer and the backend ports

pub mod report;
pub mod scope;

pub use report::{GetReportResponse, ReadReportDataRequest, ReportData};
pub use scope::ReportScope;
