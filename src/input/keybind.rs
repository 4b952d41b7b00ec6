//! Keybind table: an ordered (keysym, modifier-mask, command) triple list
//! where the first match wins. Mirrors the original's
//! `e_keybind`/`e_keybind_list` pair, collapsed into a single `Vec`-backed
//! type since Rust's `Vec` already gives us the ordered, growable list the
//! C code hand-rolled with `util/list.h`.

use bitflags::bitflags;
use xkbcommon::xkb;

bitflags! {
    /// The modifier set a keybind can be conditioned on. Named after the
    /// xkb/wlroots modifier names exposed in the config's `mods` field
    /// (`shift, caps, ctrl, alt, mod2, mod3, logo, mod5`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModMask: u32 {
        const SHIFT = 1 << 0;
        const CAPS  = 1 << 1;
        const CTRL  = 1 << 2;
        const ALT   = 1 << 3;
        const MOD2  = 1 << 4;
        const MOD3  = 1 << 5;
        const LOGO  = 1 << 6;
        const MOD5  = 1 << 7;
    }
}

impl ModMask {
    /// Parse a single `+`-separated modifier name. Unknown names are
    /// rejected — callers should treat that as a config parse error.
    pub fn from_name(name: &str) -> Option<ModMask> {
        Some(match name {
            "shift" => ModMask::SHIFT,
            "caps" => ModMask::CAPS,
            "ctrl" => ModMask::CTRL,
            "alt" => ModMask::ALT,
            "mod2" => ModMask::MOD2,
            "mod3" => ModMask::MOD3,
            "logo" => ModMask::LOGO,
            "mod5" => ModMask::MOD5,
            _ => return None,
        })
    }

    /// Parse a `+`-joined modifier string, e.g. `"logo+shift"`.
    pub fn parse(spec: &str) -> Option<ModMask> {
        let mut mask = ModMask::empty();
        for part in spec.split('+') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            mask |= ModMask::from_name(part)?;
        }
        Some(mask)
    }
}

/// A single (keysym, modifier-mask, command) binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keybind {
    pub keysym: xkb::Keysym,
    pub mods: ModMask,
    pub command: String,
}

impl Keybind {
    pub fn new(keysym: xkb::Keysym, mods: ModMask, command: impl Into<String>) -> Self {
        Self {
            keysym,
            mods,
            command: command.into(),
        }
    }

    /// Whether this bind should activate for the given resolved keysym and
    /// modifier mask. Exact (keysym, mods) equality, per the original's
    /// `e_keybind_should_activate`.
    pub fn should_activate(&self, keysym: xkb::Keysym, mods: ModMask) -> bool {
        self.keysym == keysym && self.mods == mods
    }
}

/// An ordered list of keybinds; first match wins (§3 Keybind, §4.7 Key
/// dispatch).
#[derive(Debug, Clone, Default)]
pub struct KeybindList {
    binds: Vec<Keybind>,
}

impl KeybindList {
    pub fn new() -> Self {
        Self { binds: Vec::new() }
    }

    pub fn add(&mut self, bind: Keybind) {
        self.binds.push(bind);
    }

    pub fn len(&self) -> usize {
        self.binds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binds.is_empty()
    }

    /// Index of the keybind with the exact same (keysym, mods, command), if
    /// any — mirrors `e_keybind_list_index_of`.
    pub fn index_of(&self, bind: &Keybind) -> Option<usize> {
        self.binds.iter().position(|b| b == bind)
    }

    /// The first bind matching `(keysym, mods)`, if any — first match wins.
    pub fn find_match(&self, keysym: xkb::Keysym, mods: ModMask) -> Option<&Keybind> {
        self.binds.iter().find(|b| b.should_activate(keysym, mods))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keybind> {
        self.binds.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> xkb::Keysym {
        xkb::keysym_from_name(name, xkb::KEYSYM_NO_FLAGS)
    }

    #[test]
    fn first_match_wins() {
        let mut list = KeybindList::new();
        list.add(Keybind::new(sym("F2"), ModMask::LOGO, "exec alacritty"));
        list.add(Keybind::new(sym("F2"), ModMask::LOGO, "exec kitty"));

        let found = list.find_match(sym("F2"), ModMask::LOGO).unwrap();
        assert_eq!(found.command, "exec alacritty");
    }

    #[test]
    fn no_match_returns_none() {
        let mut list = KeybindList::new();
        list.add(Keybind::new(sym("F2"), ModMask::LOGO, "exec alacritty"));
        assert!(list.find_match(sym("F3"), ModMask::LOGO).is_none());
        assert!(list.find_match(sym("F2"), ModMask::CTRL).is_none());
    }

    #[test]
    fn mod_mask_parses_plus_separated() {
        let mask = ModMask::parse("logo+shift").unwrap();
        assert!(mask.contains(ModMask::LOGO));
        assert!(mask.contains(ModMask::SHIFT));
        assert!(!mask.contains(ModMask::CTRL));
    }

    #[test]
    fn mod_mask_rejects_unknown_names() {
        assert!(ModMask::parse("logo+bogus").is_none());
    }
}
