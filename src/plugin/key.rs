//! Activation key chords for plugins.

use std::fmt;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKeyCode {
    Char(char),
    /// Function key F1..F12.
    F(u8),
}

/// A single key with optional Ctrl/Alt/Shift modifiers.
///
/// Plain runes carry no modifiers; modified runes are always ASCII letters.
/// Letters are stored lowercase except for Shift chords, which store the
/// uppercase letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginKey {
    pub code: PluginKeyCode,
    pub modifiers: KeyModifiers,
}

const MODIFIER_MASK: KeyModifiers = KeyModifiers::CONTROL
    .union(KeyModifiers::ALT)
    .union(KeyModifiers::SHIFT);

impl PluginKey {
    pub fn rune(ch: char) -> Self {
        Self {
            code: PluginKeyCode::Char(ch),
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn function(n: u8) -> Self {
        Self {
            code: PluginKeyCode::F(n),
            modifiers: KeyModifiers::NONE,
        }
    }

    /// Parse `?`, `F3`, `Ctrl-K`, `Alt+x`, `Shift-F2` and similar.
    pub fn parse(input: &str) -> Result<Self, String> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err("key cannot be empty".to_string());
        }
        let mut chars = raw.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            return Ok(Self::rune(ch));
        }

        let mut modifiers = KeyModifiers::NONE;
        let mut rest = raw;
        while let Some((modifier, tail)) = split_modifier(rest) {
            modifiers |= modifier;
            rest = tail;
        }
        Self::build(rest, modifiers).ok_or_else(|| format!("unrecognized key '{raw}'"))
    }

    /// Parse a key plus a separately configured modifier name.
    pub fn parse_with_modifier(key: &str, modifier: Option<&str>) -> Result<Self, String> {
        let Some(modifier) = modifier.map(str::trim).filter(|m| !m.is_empty()) else {
            return Self::parse(key);
        };
        let modifiers = modifier_from_name(modifier)
            .ok_or_else(|| format!("unknown modifier '{modifier}'"))?;
        Self::build(key.trim(), modifiers).ok_or_else(|| format!("unrecognized key '{key}'"))
    }

    fn build(key: &str, modifiers: KeyModifiers) -> Option<Self> {
        let code = if let Some(n) = parse_function_key(key) {
            PluginKeyCode::F(n)
        } else {
            let mut chars = key.chars();
            let ch = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            if modifiers.is_empty() {
                PluginKeyCode::Char(ch)
            } else if !ch.is_ascii_alphabetic() {
                return None;
            } else if modifiers == KeyModifiers::SHIFT {
                PluginKeyCode::Char(ch.to_ascii_uppercase())
            } else {
                PluginKeyCode::Char(ch.to_ascii_lowercase())
            }
        };
        Some(Self { code, modifiers })
    }

    /// Whether a terminal key event triggers this chord.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        if event.kind == KeyEventKind::Release {
            return false;
        }
        let mods = event.modifiers & MODIFIER_MASK;
        match (self.code, event.code) {
            (PluginKeyCode::F(want), KeyCode::F(got)) => want == got && mods == self.modifiers,
            (PluginKeyCode::Char(want), KeyCode::Char(got)) => {
                if self.modifiers.is_empty() {
                    // Uppercase letters and shifted symbols arrive with SHIFT set.
                    want == got && (mods - KeyModifiers::SHIFT).is_empty()
                } else if self.modifiers == KeyModifiers::SHIFT {
                    want.eq_ignore_ascii_case(&got)
                        && (mods.contains(KeyModifiers::SHIFT) || got.is_ascii_uppercase())
                        && (mods - KeyModifiers::SHIFT).is_empty()
                } else {
                    want.eq_ignore_ascii_case(&got)
                        && (mods - KeyModifiers::SHIFT) == (self.modifiers - KeyModifiers::SHIFT)
                }
            }
            _ => false,
        }
    }
}

fn split_modifier(input: &str) -> Option<(KeyModifiers, &str)> {
    let (head, tail) = input.split_once(['-', '+'])?;
    if tail.is_empty() {
        return None;
    }
    modifier_from_name(head).map(|modifier| (modifier, tail))
}

fn modifier_from_name(name: &str) -> Option<KeyModifiers> {
    match name.trim().to_ascii_lowercase().as_str() {
        "ctrl" | "control" | "c" => Some(KeyModifiers::CONTROL),
        "alt" | "meta" | "m" | "a" => Some(KeyModifiers::ALT),
        "shift" | "s" => Some(KeyModifiers::SHIFT),
        _ => None,
    }
}

fn parse_function_key(input: &str) -> Option<u8> {
    let digits = input.strip_prefix(['f', 'F'])?;
    let n: u8 = digits.parse().ok()?;
    (1..=12).contains(&n).then_some(n)
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            f.write_str("Ctrl-")?;
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            f.write_str("Alt-")?;
        }
        if self.modifiers.contains(KeyModifiers::SHIFT) {
            f.write_str("Shift-")?;
        }
        match self.code {
            PluginKeyCode::Char(ch) if !self.modifiers.is_empty() => {
                write!(f, "{}", ch.to_ascii_uppercase())
            }
            PluginKeyCode::Char(ch) => write!(f, "{ch}"),
            PluginKeyCode::F(n) => write!(f, "F{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn parses_supported_chords() {
        assert_eq!(PluginKey::parse("?").unwrap(), PluginKey::rune('?'));
        assert_eq!(PluginKey::parse("-").unwrap(), PluginKey::rune('-'));
        assert_eq!(PluginKey::parse("F3").unwrap(), PluginKey::function(3));

        let ctrl = PluginKey::parse("Ctrl-K").unwrap();
        assert_eq!(ctrl.code, PluginKeyCode::Char('k'));
        assert_eq!(ctrl.modifiers, KeyModifiers::CONTROL);

        let shift = PluginKey::parse("shift+b").unwrap();
        assert_eq!(shift.code, PluginKeyCode::Char('B'));

        let alt_f = PluginKey::parse("Alt-F12").unwrap();
        assert_eq!(alt_f.code, PluginKeyCode::F(12));
        assert_eq!(alt_f.modifiers, KeyModifiers::ALT);
    }

    #[test]
    fn rejects_bad_chords() {
        for raw in ["", "F13", "F0", "Ctrl-?", "Hyper-K", "ab", "Ctrl-"] {
            assert!(PluginKey::parse(raw).is_err(), "{raw:?}");
        }
    }

    #[test]
    fn separate_modifier_field() {
        let key = PluginKey::parse_with_modifier("k", Some("ctrl")).unwrap();
        assert_eq!(key, PluginKey::parse("Ctrl-K").unwrap());
        assert_eq!(
            PluginKey::parse_with_modifier("F2", None).unwrap(),
            PluginKey::function(2)
        );
        assert!(PluginKey::parse_with_modifier("k", Some("super")).is_err());
    }

    #[test]
    fn matches_terminal_events() {
        let ctrl_k = PluginKey::parse("Ctrl-K").unwrap();
        assert!(ctrl_k.matches(&press(KeyCode::Char('k'), KeyModifiers::CONTROL)));
        assert!(!ctrl_k.matches(&press(KeyCode::Char('k'), KeyModifiers::NONE)));
        assert!(!ctrl_k.matches(&press(KeyCode::Char('k'), KeyModifiers::ALT)));

        let question = PluginKey::rune('?');
        assert!(question.matches(&press(KeyCode::Char('?'), KeyModifiers::SHIFT)));
        assert!(!question.matches(&press(KeyCode::Char('/'), KeyModifiers::NONE)));

        let shift_b = PluginKey::parse("Shift-B").unwrap();
        assert!(shift_b.matches(&press(KeyCode::Char('B'), KeyModifiers::SHIFT)));
        assert!(!shift_b.matches(&press(KeyCode::Char('b'), KeyModifiers::NONE)));

        let f3 = PluginKey::function(3);
        assert!(f3.matches(&press(KeyCode::F(3), KeyModifiers::NONE)));
        assert!(!f3.matches(&press(KeyCode::F(3), KeyModifiers::CONTROL)));

        let mut release = press(KeyCode::F(3), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert!(!f3.matches(&release));
    }

    #[test]
    fn display_is_reparseable() {
        for raw in ["Ctrl-K", "F5", "Shift-F2", "x", "Alt-Q"] {
            let key = PluginKey::parse(raw).unwrap();
            assert_eq!(PluginKey::parse(&key.to_string()).unwrap(), key);
        }
    }
}
