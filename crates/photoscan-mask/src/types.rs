use std::{fmt, str::FromStr};

use crate::MaskError;

/// The photograph formats that can be masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFileType {
    /// Nikon RAW files, converted to an intermediate JPEG before masking.
    Nef,
    /// JPEG files, masked as they are.
    Jpg,
}

impl SourceFileType {
    /// The file name suffix matched by the file walker.
    pub fn extension(&self) -> &'static str {
        match self {
            SourceFileType::Nef => ".NEF",
            SourceFileType::Jpg => ".jpg",
        }
    }

    /// Whether the files must be decoded to JPEG before reaching a mask backend.
    pub fn is_raw(&self) -> bool {
        matches!(self, SourceFileType::Nef)
    }
}

impl FromStr for SourceFileType {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            ".nef" => Ok(SourceFileType::Nef),
            ".jpg" => Ok(SourceFileType::Jpg),
            _ => Err(MaskError::InvalidFileType(s.to_string())),
        }
    }
}

impl fmt::Display for SourceFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// The mask backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMethod {
    /// The remove.bg web service.
    RemoveBg,
    /// The local ISNet segmentation model.
    Rembg,
}

impl FromStr for ProcessMethod {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "removebg" => Ok(ProcessMethod::RemoveBg),
            "rembg" => Ok(ProcessMethod::Rembg),
            _ => Err(MaskError::InvalidMethod(s.to_string())),
        }
    }
}

impl fmt::Display for ProcessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessMethod::RemoveBg => f.write_str("removebg"),
            ProcessMethod::Rembg => f.write_str("rembg"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_type() -> Result<(), MaskError> {
        assert_eq!(".NEF".parse::<SourceFileType>()?, SourceFileType::Nef);
        assert_eq!(".nef".parse::<SourceFileType>()?, SourceFileType::Nef);
        assert_eq!(".jpg".parse::<SourceFileType>()?, SourceFileType::Jpg);
        assert!(matches!(
            ".png".parse::<SourceFileType>(),
            Err(MaskError::InvalidFileType(t)) if t == ".png"
        ));
        Ok(())
    }

    #[test]
    fn test_parse_method() -> Result<(), MaskError> {
        for method in [ProcessMethod::RemoveBg, ProcessMethod::Rembg] {
            assert_eq!(method.to_string().parse::<ProcessMethod>()?, method);
        }
        assert!(matches!(
            "grabcut".parse::<ProcessMethod>(),
            Err(MaskError::InvalidMethod(_))
        ));
        Ok(())
    }

    #[test]
    fn test_file_type_display() {
        assert_eq!(SourceFileType::Nef.to_string(), ".NEF");
        assert!(SourceFileType::Nef.is_raw());
        assert!(!SourceFileType::Jpg.is_raw());
    }
}
