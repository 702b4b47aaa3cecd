use std::fmt;
use std::str::FromStr;

/// Element types a benchmark matrix can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit floating point.
    F32,
    /// 64-bit floating point.
    F64,
}

impl DType {
    /// Returns the size in bytes of a single element.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F64 => 8,
        }
    }

    /// Short tag used in reference file names and reports.
    pub fn tag(&self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }

    /// Parses a tag produced by [`DType::tag`]. The C-style names `float`
    /// and `double` are accepted as well.
    pub fn from_tag(tag: &str) -> Option<DType> {
        match tag {
            "f32" | "float" => Some(DType::F32),
            "f64" | "double" => Some(DType::F64),
            _ => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for DType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        DType::from_tag(&s.to_ascii_lowercase())
            .ok_or_else(|| format!("unknown element type '{}', expected f32 or f64", s))
    }
}
