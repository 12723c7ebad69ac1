use std::io::Cursor;
use std::path::Path;

use anyhow::Context;
use ash::util::read_spv;

/// Reads a pre-compiled SPIR-V blob from disk. The bytes are opaque to
/// us beyond word alignment; a missing or malformed file is fatal.
pub fn load_spv(path: impl AsRef<Path>) -> anyhow::Result<Vec<u32>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read shader file {}", path.display()))?;
    decode_spv(&bytes).with_context(|| format!("invalid SPIR-V in {}", path.display()))
}

fn decode_spv(bytes: &[u8]) -> anyhow::Result<Vec<u32>> {
    read_spv(&mut Cursor::new(bytes)).context("failed to decode SPIR-V words")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: u32 = 0x0723_0203;

    fn words_to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn decodes_little_endian_words() {
        let words = [MAGIC, 0x0001_0600, 0, 1, 0];
        let decoded = decode_spv(&words_to_bytes(&words)).unwrap();
        assert_eq!(decoded, words);
    }

    #[test]
    fn rejects_truncated_input() {
        let mut bytes = words_to_bytes(&[MAGIC, 42]);
        bytes.pop();
        assert!(decode_spv(&bytes).is_err());
    }

    #[test]
    fn rejects_missing_magic_number() {
        let bytes = words_to_bytes(&[0xdead_beef, 42]);
        assert!(decode_spv(&bytes).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_spv("does/not/exist.spv").unwrap_err();
        assert!(err.to_string().contains("does/not/exist.spv"));
    }
}
