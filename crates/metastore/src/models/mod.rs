mod template;
mod version;

pub use self::template::{QueryTemplate, Visibility};
pub(crate) use self::version::{LocatedRow, UserRow, VersionRow};
pub use self::version::{DatabaseVersion, LocatedVersion, NewVersion, User};
