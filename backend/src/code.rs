use rand::Rng;

pub const CODE_LEN: usize = 6;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draw 6-character codes until one is not `taken`.
pub fn room_code<R: Rng + ?Sized>(rng: &mut R, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let code: String = (0..CODE_LEN)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();
        if !taken(&code) {
            return code;
        }
    }
}

/// Codes are typed by hand, so accept any case and stray whitespace.
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
