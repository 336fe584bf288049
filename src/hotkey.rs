//! Overlay toggle hotkey.

use std::fmt;

use anyhow::{Result, anyhow};

use crate::platform::InputPlatform;
use crate::types::{WindowMessage, msg};

pub const VK_SHIFT: u32 = 0x10;
pub const VK_F9: u32 = 0x78;

/// Modifier held together with a key, checked on the key's first key-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub modifier: u32,
    pub key: u32,
}

impl Default for Hotkey {
    /// SHIFT+F9
    fn default() -> Self {
        Self {
            modifier: VK_SHIFT,
            key: VK_F9,
        }
    }
}

impl Hotkey {
    pub const fn new(modifier: u32, key: u32) -> Self {
        Self { modifier, key }
    }

    /// Builds a hotkey from key names such as `"SHIFT"` and `"F9"`.
    pub fn from_names(modifier: &str, key: &str) -> Result<Self> {
        let modifier_vk =
            key_name_to_vk(modifier).ok_or_else(|| anyhow!("Unknown modifier key: {}", modifier))?;
        let key_vk = key_name_to_vk(key).ok_or_else(|| anyhow!("Unknown toggle key: {}", key))?;
        if modifier_vk == key_vk {
            anyhow::bail!("Toggle key and modifier are both {}", key);
        }
        Ok(Self::new(modifier_vk, key_vk))
    }

    /// True for the first key-down of the key while the modifier is held.
    #[inline]
    pub fn matches(&self, message: &WindowMessage, platform: &dyn InputPlatform) -> bool {
        matches!(message.message, msg::WM_KEYDOWN | msg::WM_SYSKEYDOWN)
            && !message.is_auto_repeat()
            && message.wparam == self.key as usize
            && platform.is_key_down(self.modifier)
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", vk_to_key_name(self.modifier), vk_to_key_name(self.key))
    }
}

/// Converts a virtual key code to its key name.
pub fn vk_to_key_name(vk: u32) -> String {
    match vk {
        // A-Z, 0-9
        0x41..=0x5A | 0x30..=0x39 => char::from_u32(vk).map(String::from).unwrap_or_default(),
        0x60..=0x69 => format!("NUMPAD{}", vk - 0x60),
        0x70..=0x87 => format!("F{}", vk - 0x70 + 1),
        0x10 => "SHIFT".to_string(),
        0x11 => "CTRL".to_string(),
        0x12 => "ALT".to_string(),
        0xA0 => "LSHIFT".to_string(),
        0xA1 => "RSHIFT".to_string(),
        0xA2 => "LCTRL".to_string(),
        0xA3 => "RCTRL".to_string(),
        0xA4 => "LALT".to_string(),
        0xA5 => "RALT".to_string(),
        0x5B => "LWIN".to_string(),
        0x5C => "RWIN".to_string(),
        0x20 => "SPACE".to_string(),
        0x0D => "RETURN".to_string(),
        0x09 => "TAB".to_string(),
        0x1B => "ESCAPE".to_string(),
        0x08 => "BACK".to_string(),
        0x2E => "DELETE".to_string(),
        0x2D => "INSERT".to_string(),
        0x24 => "HOME".to_string(),
        0x23 => "END".to_string(),
        0x21 => "PAGEUP".to_string(),
        0x22 => "PAGEDOWN".to_string(),
        0x26 => "UP".to_string(),
        0x28 => "DOWN".to_string(),
        0x25 => "LEFT".to_string(),
        0x27 => "RIGHT".to_string(),
        0x13 => "PAUSE".to_string(),
        0x91 => "SCROLL".to_string(),
        0xC0 => "OEM_3".to_string(),
        _ => format!("VK_{:02X}", vk),
    }
}

/// Converts a key name to its virtual key code. Case insensitive.
pub fn key_name_to_vk(key_name: &str) -> Option<u32> {
    let key = key_name.trim().to_uppercase();

    // letter and number keys
    if key.len() == 1
        && let Some(c) = key.chars().next()
        && (c.is_ascii_alphabetic() || c.is_ascii_digit())
    {
        return Some(c as u32);
    }

    // F1-F24
    if key.starts_with('F')
        && key.len() > 1
        && let Ok(num) = key[1..].parse::<u32>()
        && (1..=24).contains(&num)
    {
        return Some(0x70 + num - 1);
    }

    // Numpad keys
    if key.starts_with("NUMPAD")
        && key.len() > 6
        && let Ok(num) = key[6..].parse::<u32>()
        && num <= 9
    {
        return Some(0x60 + num);
    }

    match key.as_str() {
        "SHIFT" => Some(0x10),
        "CTRL" | "CONTROL" => Some(0x11),
        "ALT" | "MENU" => Some(0x12),
        "LSHIFT" => Some(0xA0),
        "RSHIFT" => Some(0xA1),
        "LCTRL" => Some(0xA2),
        "RCTRL" => Some(0xA3),
        "LALT" => Some(0xA4),
        "RALT" => Some(0xA5),
        "LWIN" => Some(0x5B),
        "RWIN" => Some(0x5C),
        "ESC" | "ESCAPE" => Some(0x1B),
        "ENTER" | "RETURN" => Some(0x0D),
        "TAB" => Some(0x09),
        "SPACE" => Some(0x20),
        "BACKSPACE" | "BACK" => Some(0x08),
        "DELETE" => Some(0x2E),
        "INSERT" => Some(0x2D),
        "HOME" => Some(0x24),
        "END" => Some(0x23),
        "PAGEUP" => Some(0x21),
        "PAGEDOWN" => Some(0x22),
        "UP" => Some(0x26),
        "DOWN" => Some(0x28),
        "LEFT" => Some(0x25),
        "RIGHT" => Some(0x27),
        "PAUSE" => Some(0x13),
        "SCROLL" => Some(0x91),
        "OEM_3" | "TILDE" => Some(0xC0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::simulated::SimulatedPlatform;
    use crate::types::WindowHandle;

    fn key_down(vk: u32, lparam: isize) -> WindowMessage {
        WindowMessage::new(WindowHandle(1), msg::WM_KEYDOWN, vk as usize, lparam)
    }

    #[test]
    fn test_key_name_to_vk() {
        assert_eq!(key_name_to_vk("F9"), Some(VK_F9));
        assert_eq!(key_name_to_vk("f12"), Some(0x7B));
        assert_eq!(key_name_to_vk("shift"), Some(VK_SHIFT));
        assert_eq!(key_name_to_vk("a"), Some(0x41));
        assert_eq!(key_name_to_vk("7"), Some(0x37));
        assert_eq!(key_name_to_vk("NUMPAD3"), Some(0x63));
        assert_eq!(key_name_to_vk("INSERT"), Some(0x2D));
        assert_eq!(key_name_to_vk("F25"), None);
        assert_eq!(key_name_to_vk("NOPE"), None);
    }

    #[test]
    fn test_from_names() {
        assert_eq!(Hotkey::from_names("SHIFT", "F9").unwrap(), Hotkey::default());
        assert_eq!(
            Hotkey::from_names("ctrl", "insert").unwrap(),
            Hotkey::new(0x11, 0x2D)
        );
        assert!(Hotkey::from_names("HYPER", "F9").is_err());
        assert!(Hotkey::from_names("SHIFT", "SHIFT").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Hotkey::default().to_string(), "SHIFT+F9");
        assert_eq!(Hotkey::new(0xA2, 0x41).to_string(), "LCTRL+A");
    }

    #[test]
    fn test_matches_requires_modifier() {
        let sim = SimulatedPlatform::new();
        let hotkey = Hotkey::default();
        assert!(!hotkey.matches(&key_down(VK_F9, 0), &sim));

        sim.set_key_down(VK_SHIFT, true);
        assert!(hotkey.matches(&key_down(VK_F9, 0), &sim));
        assert!(!hotkey.matches(&key_down(0x78 + 1, 0), &sim));
    }

    #[test]
    fn test_matches_ignores_repeat_and_key_up() {
        let sim = SimulatedPlatform::new();
        sim.set_key_down(VK_SHIFT, true);
        let hotkey = Hotkey::default();

        assert!(!hotkey.matches(&key_down(VK_F9, 0x4000_0001), &sim));
        let key_up = WindowMessage::new(WindowHandle(1), msg::WM_KEYUP, VK_F9 as usize, 0);
        assert!(!hotkey.matches(&key_up, &sim));
    }
}
