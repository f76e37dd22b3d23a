// crates/session-client/src/nickname.rs

//! Leaderboard nickname entry.
//!
//! Nicknames are upper-case ASCII letters and digits, at most
//! [`MAX_LEN`] characters. Players on a Korean 2-set keyboard produce
//! jamo instead of Latin letters; each jamo is mapped back to the Latin
//! letter printed on the same key.

pub const MAX_LEN: usize = 10;

/// Latin key for a Korean 2-set keyboard jamo.
pub fn latin_key(c: char) -> Option<char> {
    let key = match c {
        'ㄱ' | 'ㄲ' => 'R',
        'ㄴ' => 'S',
        'ㄷ' | 'ㄸ' => 'E',
        'ㄹ' => 'F',
        'ㅁ' => 'A',
        'ㅂ' | 'ㅃ' => 'Q',
        'ㅅ' | 'ㅆ' => 'T',
        'ㅇ' => 'D',
        'ㅈ' | 'ㅉ' => 'W',
        'ㅊ' => 'C',
        'ㅋ' => 'Z',
        'ㅌ' => 'X',
        'ㅍ' => 'V',
        'ㅎ' => 'G',
        'ㅏ' => 'K',
        'ㅐ' | 'ㅒ' => 'O',
        'ㅑ' => 'I',
        'ㅓ' => 'J',
        'ㅔ' | 'ㅖ' => 'P',
        'ㅕ' => 'U',
        'ㅗ' => 'H',
        'ㅛ' => 'Y',
        'ㅜ' => 'N',
        'ㅠ' => 'B',
        'ㅡ' => 'M',
        'ㅣ' => 'L',
        _ => return None,
    };
    Some(key)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nickname {
    text: String,
}

impl Nickname {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one typed character. Returns whether it was accepted.
    pub fn push(&mut self, c: char) -> bool {
        if self.is_full() {
            return false;
        }
        let mapped = match latin_key(c) {
            Some(k) => k,
            None if c.is_ascii_alphanumeric() => c.to_ascii_uppercase(),
            None => return false,
        };
        self.text.push(mapped);
        true
    }

    pub fn backspace(&mut self) {
        self.text.pop();
    }

    pub fn is_full(&self) -> bool {
        self.text.chars().count() >= MAX_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl From<&str> for Nickname {
    /// Type every character of `input` in order.
    fn from(input: &str) -> Self {
        let mut n = Nickname::new();
        for c in input.chars() {
            n.push(c);
        }
        n
    }
}
