//! Project properties built on the property framework

mod common;

pub use common::{
    CommonProperties, CommonProperty, CommonSettings, CustomTask, CustomTaskEncoding,
    CustomTasksEncoding, EncodingLabelEncoding, SourceLevel,
};
