//! Keyboard state: xkb keymap compilation from [`KeyboardConfig`] and the
//! key-dispatch step of §4.7 ("Key dispatch") — translating a raw keycode
//! to the keysyms/modifier mask the keybind table matches against.

use xkbcommon::xkb;

use crate::config::KeyboardConfig;
use crate::input::keybind::{KeybindList, ModMask};

pub struct Keyboard {
    context: xkb::Context,
    state: xkb::State,
}

impl Keyboard {
    pub fn new(config: &KeyboardConfig) -> Option<Self> {
        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let keymap = xkb::Keymap::new_from_names(
            &context,
            "",
            "",
            &config.layout,
            &config.variant,
            config.options.clone(),
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )?;
        let state = xkb::State::new(&keymap);
        Some(Self { context, state })
    }

    /// Feed a libinput keycode (which is the evdev code minus 8, per the
    /// xkb convention) through the compiled keymap, returning the keysyms
    /// it currently produces and the active `ModMask`.
    pub fn translate(&mut self, libinput_keycode: u32, pressed: bool) -> (Vec<xkb::Keysym>, ModMask) {
        let xkb_keycode = xkb::Keycode::new(libinput_keycode + 8);
        let direction = if pressed {
            xkb::KeyDirection::Down
        } else {
            xkb::KeyDirection::Up
        };
        self.state.update_key(xkb_keycode, direction);

        let keysyms = self.state.key_get_syms(xkb_keycode).to_vec();
        let mods = self.active_mod_mask();
        (keysyms, mods)
    }

    fn active_mod_mask(&self) -> ModMask {
        let mut mask = ModMask::empty();
        let names = [
            (xkb::MOD_NAME_SHIFT, ModMask::SHIFT),
            (xkb::MOD_NAME_CAPS, ModMask::CAPS),
            (xkb::MOD_NAME_CTRL, ModMask::CTRL),
            (xkb::MOD_NAME_ALT, ModMask::ALT),
            (xkb::MOD_NAME_LOGO, ModMask::LOGO),
        ];
        for (name, bit) in names {
            if self
                .state
                .mod_name_is_active(name, xkb::STATE_MODS_EFFECTIVE)
            {
                mask |= bit;
            }
        }
        mask
    }

    pub fn context(&self) -> &xkb::Context {
        &self.context
    }
}

/// Scan `keybinds` for the first entry whose `(keysym, mods)` matches any
/// of the keysyms this key currently produces, per §4.7's "for each bound
/// keysym produced by the key, scans the keybind list" — a single
/// physical key can produce more than one keysym (e.g. a dead key), and
/// the first keysym with a match wins, not the first keysym in the list.
pub fn resolve_keybind<'a>(
    keysyms: &[xkb::Keysym],
    mods: ModMask,
    keybinds: &'a KeybindList,
) -> Option<&'a str> {
    keysyms
        .iter()
        .find_map(|sym| keybinds.find_match(*sym, mods))
        .map(|bind| bind.command.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::keybind::Keybind;

    fn sym(name: &str) -> xkb::Keysym {
        xkb::keysym_from_name(name, xkb::KEYSYM_NO_FLAGS)
    }

    #[test]
    fn resolve_keybind_matches_first_keysym_with_a_bind() {
        let mut keybinds = KeybindList::new();
        keybinds.add(Keybind::new(sym("Return"), ModMask::LOGO, "exec alacritty"));

        let produced = [sym("F13"), sym("Return")];
        let command = resolve_keybind(&produced, ModMask::LOGO, &keybinds);
        assert_eq!(command, Some("exec alacritty"));
    }

    #[test]
    fn resolve_keybind_returns_none_when_nothing_matches() {
        let keybinds = KeybindList::new();
        let produced = [sym("q")];
        assert_eq!(resolve_keybind(&produced, ModMask::empty(), &keybinds), None);
    }
}
