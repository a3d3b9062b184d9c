//! Effective property values published as capabilities.
//!
//! Each wrapper is its own type so that the lookup can tell, for example,
//! the build platform from the script platform.

use std::fmt;
use std::sync::Arc;

use crate::platform::Platform;
use crate::properties::SourceLevel;
use crate::property::PropertySource;

macro_rules! exposed_property {
    ($(#[$doc:meta])* $name:ident, $value:ty) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name {
            source: Arc<dyn PropertySource<Option<$value>>>,
        }

        impl $name {
            pub fn new(source: Arc<dyn PropertySource<Option<$value>>>) -> Self {
                Self { source }
            }

            pub fn source(&self) -> &Arc<dyn PropertySource<Option<$value>>> {
                &self.source
            }

            pub fn value(&self) -> Option<$value> {
                self.source.get_value()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }
    };
}

exposed_property!(
    /// Platform the project is built for.
    BuildPlatformProperty,
    Platform
);
exposed_property!(
    /// Platform running the build scripts.
    ScriptPlatformProperty,
    Platform
);
exposed_property!(SourceEncodingProperty, String);
exposed_property!(SourceLevelProperty, SourceLevel);
