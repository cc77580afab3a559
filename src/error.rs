//! Start-up errors. Request failures are rendered as error pages instead.

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open metadata store")]
    Metadata,
    #[display("could not set up object storage")]
    Storage,
    #[display("S3 storage is configured but this build doesn't include it")]
    S3Unsupported,
    #[display("could not open cache")]
    Cache,
    #[display("could not prepare directory: {}", _0.display())]
    Directory(#[error(not(source))] PathBuf),
    #[display("could not read input file: {}", _0.display())]
    Input(#[error(not(source))] PathBuf),
    #[display("could not write output")]
    Output,
}
