pub fn u8s_from_str(input: &str) -> [u8; 32] {
    blake3::hash(input.as_bytes()).into()
}

/// Derives a 32 byte RNG seed from `parts` joined with ':'.
pub fn seed_from_parts(parts: &[&str]) -> [u8; 32] {
    u8s_from_str(&parts.join(":"))
}
