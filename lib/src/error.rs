use std::{fmt, io};
use std::panic::Location;
use std::path::PathBuf;
use std::error::Error as StdError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Broad classification of a failure. `Other` marks pure context details;
/// [`Error::kind()`] digs through a chain for the first specific kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Kind {
    /// A required input path is missing or has the wrong file type.
    NotFound,
    /// A stylesheet could not be decomposed into rules.
    Parse,
    /// A read or write failed.
    Io,
    Other,
}

#[derive(Debug)]
pub struct Error {
    detail: Vec<Box<dyn ErrorDetail>>,
    prev: Option<Box<Error>>,
    _location: &'static Location<'static>,
}

pub trait ErrorDetail: fmt::Display + fmt::Debug + Send + Sync {
    fn kind(&self) -> Kind { Kind::Other }
    fn context(&self) -> Vec<(Option<String>, String)> { vec![] }
}

impl Error {
    /// Attaches `self` as the cause at the end of `other`'s chain and
    /// returns `other`, now the outermost context.
    pub fn chain(self, mut other: Error) -> Self {
        #[inline]
        fn _chain(error: Error, behind: &mut Error) {
            if let Some(prev) = behind.prev.as_mut() {
                _chain(error, prev);
            } else {
                behind.prev = Some(Box::new(error));
            }
        }

        _chain(self, &mut other);
        other
    }

    /// The first specific [`Kind`] anywhere in the chain, outermost first.
    pub fn kind(&self) -> Kind {
        self.detail.iter()
            .map(|detail| detail.kind())
            .find(|&kind| kind != Kind::Other)
            .or_else(|| match self.prev.as_ref().map(|prev| prev.kind()) {
                Some(Kind::Other) | None => None,
                kind => kind,
            })
            .unwrap_or(Kind::Other)
    }
}

pub(crate) fn std_context(error: &dyn StdError) -> Vec<(Option<String>, String)> {
    let mut ctxt = vec![];
    let mut source = error.source();
    while let Some(e) = source {
        ctxt.push((None, e.to_string()));
        source = e.source();
    }

    ctxt
}

macro_rules! impl_error_detail_with_std_error {
    ($T:ty, $kind:expr) => {
        impl $crate::error::ErrorDetail for $T {
            fn kind(&self) -> $crate::error::Kind { $kind }

            fn context(&self) -> Vec<(Option<String>, String)> {
                $crate::error::std_context(self)
            }
        }
    }
}

impl_error_detail_with_std_error!(io::Error, Kind::Io);
impl_error_detail_with_std_error!(toml::de::Error, Kind::Other);

impl ErrorDetail for String { }
impl ErrorDetail for &str { }

/// A required input path that does not exist or is not the expected kind
/// of file system object.
#[derive(Debug)]
pub struct NotFound {
    pub path: PathBuf,
    /// What was expected at `path`: `"directory"` or `"file"`.
    pub expected: &'static str,
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no such {}", self.expected)
    }
}

impl ErrorDetail for NotFound {
    fn kind(&self) -> Kind { Kind::NotFound }

    fn context(&self) -> Vec<(Option<String>, String)> {
        vec![(Some("path".into()), self.path.display().to_string())]
    }
}

/// A stylesheet that could not be split into rules.
#[derive(Debug)]
pub struct Parse {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Parse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

impl ErrorDetail for Parse {
    fn kind(&self) -> Kind { Kind::Parse }

    fn context(&self) -> Vec<(Option<String>, String)> {
        vec![
            (Some("line".into()), self.line.to_string()),
            (Some("column".into()), self.column.to_string()),
        ]
    }
}

impl<T: ErrorDetail + 'static> From<T> for Error {
    #[track_caller]
    fn from(detail: T) -> Self {
        Error {
            prev: None,
            detail: vec![Box::new(detail)],
            _location: std::panic::Location::caller(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Copy, Clone)] struct Indent(usize);

        impl fmt::Display for Indent {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for _ in 0..(self.0 * 4) { write!(f, " ")? }
                Ok(())
            }
        }

        struct NestedError<'a>(Indent, &'a Error);

        impl fmt::Display for NestedError<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let NestedError(indent, e) = self;

                for detail in &e.detail {
                    let indent_line = format!("\n{indent}");

                    writeln!(f, "{indent}{}", format!("{:#}", detail).replace('\n', &indent_line))?;
                    if let Some(prev) = &e.prev {
                        NestedError(Indent(indent.0 + 1), prev).fmt(f)?;
                    }

                    for (key, value) in detail.context() {
                        let value = value.replace('\n', &indent_line);
                        if let Some(key) = key {
                            writeln!(f, "{indent}{key}: {value}")?;
                        } else {
                            writeln!(f, "{indent}{value}")?;
                        }
                    }

                    if std::env::var_os("RUST_BACKTRACE").is_some() {
                        writeln!(f, "{indent}[{}]", e._location)?;
                    }
                }

                Ok(())
            }
        }

        NestedError(Indent(0), self).fmt(f)
    }
}

#[derive(Debug)]
pub struct MakeshiftError {
    pub message: String,
    pub parameters: Vec<(Option<String>, String)>,
}

impl fmt::Display for MakeshiftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

impl ErrorDetail for MakeshiftError {
    fn context(&self) -> Vec<(Option<String>, String)> {
        self.parameters.clone()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! err {
    ($($token:tt)*) => (Err($crate::error!($($token)*)));
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($msg:expr $(, $($rest:tt)*)?) => (
        $crate::error::Error::from($crate::error::MakeshiftError {
            message: $msg.to_string(),
            parameters: {
                #[allow(unused_mut)]
                let mut v: Vec<(Option<String>, String)> = Vec::new();
                $($crate::error!(@param v $($rest)*);)?
                v
            },
        })
    );

    (@param $v:ident $key:expr => $value:expr, $($rest:tt)*) => {
        $crate::error!(@param $v $key => $value);
        $crate::error!(@param $v $($rest)*);
    };

    (@param $v:ident $key:expr => $value:expr) => {
        $v.push((Some($key.to_string()), $value.to_string()));
    };

    (@param $v:ident $value:expr, $($rest:tt)*) => {
        $crate::error!(@param $v $value);
        $crate::error!(@param $v $($rest)*);
    };

    (@param $v:ident $value:expr) => {
        $v.push((None, $value.to_string()));
    };

    (@param $v:ident $(,)?) => { };
}

pub trait Chainable<T> {
    fn chain(self, other: impl Into<Error>) -> Result<T>;

    fn chain_with<F, E>(self, f: F) -> Result<T>
        where F: FnOnce() -> E, E: Into<Error>;
}

impl<T, E: Into<Error>> Chainable<T> for Result<T, E> {
    #[track_caller]
    fn chain(self, other: impl Into<Error>) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().chain(other.into()))
        }
    }

    fn chain_with<F, Err>(self, f: F) -> Result<T>
        where F: FnOnce() -> Err, Err: Into<Error>,
     {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().chain(f().into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_surfaces_through_chained_context() {
        let base: Error = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert_eq!(base.kind(), Kind::Io);

        let chained = base.chain(error! {
            "failed to write subset",
            "path" => "icons.min.css",
        });

        assert_eq!(chained.kind(), Kind::Io);

        let rendered = chained.to_string();
        assert!(rendered.contains("failed to write subset"));
        assert!(rendered.contains("icons.min.css"));
    }

    #[test]
    fn typed_details_report_their_kind() {
        let parse: Error = Parse { message: "unclosed block".into(), line: 3, column: 9 }.into();
        assert_eq!(parse.kind(), Kind::Parse);
        assert!(parse.to_string().contains("line: 3"));

        let missing: Error = NotFound { path: "dist".into(), expected: "directory" }.into();
        assert_eq!(missing.kind(), Kind::NotFound);

        assert_eq!(error!("nothing specific").kind(), Kind::Other);
    }
}
