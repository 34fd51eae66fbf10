//! Intermediate representation shared by every pipeline stage.
//!
//! - [`StructuredRequirement`]: what the user asked for, possibly incomplete
//! - [`TimeRange`] / [`TimeWindow`]: requested period and its interpretation
//! - [`Response`]: the success / clarify / error envelope returned to callers

mod requirement;
mod response;
mod time;

pub use requirement::{OrderBy, SortDirection, StructuredRequirement, NONE_DIMENSION};
pub use response::{ClarificationQuestion, RequirementField, Response, SqlResponse};
pub use time::{
    month_start, DateBounds, RelativeWindow, TimeRange, TimeRangeError, TimeRangeKind, TimeWindow,
};
