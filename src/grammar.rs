/// Tree-sitter grammar resolution by file extension.
use std::path::Path;

use crate::error::Error;
use crate::types::Language;

/// Map a file extension to its source language.
///
/// # Errors
///
/// Returns `Error::UnsupportedLanguage` for unknown extensions.
pub fn language_for_path(path: &Path) -> Result<Language, Error> {
    let ext = path.extension().and_then(|e| return e.to_str()).unwrap_or("");

    return match ext {
        "java" => Ok(Language::Java),
        "rs" => Ok(Language::Rust),
        _ => Err(Error::UnsupportedLanguage {
            ext: ext.to_string(),
        }),
    };
}

/// The tree-sitter grammar used to parse a language.
pub fn tree_sitter_language(language: Language) -> tree_sitter::Language {
    return match language {
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn java_and_rust_are_supported() {
        assert_eq!(language_for_path(Path::new("src/Foo.java")).unwrap(), Language::Java);
        assert_eq!(language_for_path(Path::new("src/lib.rs")).unwrap(), Language::Rust);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = language_for_path(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedLanguage { ext } if ext == "txt"));
    }
}
