//! Lightweight STL sniffing. Checks the header shape only; no geometry is parsed.

const HEADER_LEN: usize = 80;
const ASCII_SCAN_LEN: usize = 1024;
const MAX_TRIANGLES: u32 = 10_000_000;

/// Whether `bytes` plausibly hold an ASCII or binary STL
pub fn looks_like_stl(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_LEN {
        return false;
    }

    if bytes.starts_with(b"solid ") {
        let scan = &bytes[..bytes.len().min(ASCII_SCAN_LEN)];
        let text = String::from_utf8_lossy(scan).to_lowercase();
        return ["facet", "normal", "vertex", "endsolid"]
            .iter()
            .any(|keyword| text.contains(keyword));
    }

    match bytes.get(HEADER_LEN..HEADER_LEN + 4) {
        Some(count) => {
            let triangles = u32::from_le_bytes([count[0], count[1], count[2], count[3]]);
            triangles <= MAX_TRIANGLES
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_stl(triangles: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes.extend_from_slice(&triangles.to_le_bytes());
        bytes.extend(std::iter::repeat(0u8).take(50 * triangles.min(4) as usize));
        bytes
    }

    #[test]
    fn test_ascii_stl() {
        let mut text = String::from("solid cube\n");
        text.push_str("  facet normal 0 0 1\n    outer loop\n      vertex 0 0 0\n");
        text.push_str("      vertex 1 0 0\n      vertex 1 1 0\n");
        text.push_str("    endloop\n  endfacet\nendsolid cube\n");
        assert!(looks_like_stl(text.as_bytes()));
    }

    #[test]
    fn test_ascii_header_without_keywords() {
        let text = format!("solid {}", "x".repeat(200));
        assert!(!looks_like_stl(text.as_bytes()));
    }

    #[test]
    fn test_binary_stl() {
        assert!(looks_like_stl(&binary_stl(12)));
        assert!(!looks_like_stl(&binary_stl(MAX_TRIANGLES + 1)));
    }

    #[test]
    fn test_too_short() {
        assert!(!looks_like_stl(b"solid"));
        assert!(!looks_like_stl(&[0u8; HEADER_LEN + 2]));
    }
}
