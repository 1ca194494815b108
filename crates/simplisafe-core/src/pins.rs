// ── PIN table rules ──
//
// The vendor only accepts the whole PIN table at once, so edits are applied
// to a freshly fetched copy and sent back in full.

use indexmap::IndexMap;

use simplisafe_api::rest::{MAX_USER_PINS, RESERVED_PIN_LABELS};

use crate::error::CoreError;

pub const PIN_LENGTH: usize = 4;

fn pin_error(message: impl Into<String>) -> CoreError {
    CoreError::Pin {
        message: message.into(),
    }
}

fn is_reserved(label: &str) -> bool {
    RESERVED_PIN_LABELS.contains(&label)
}

/// Return `pins` with `label` set to `pin`.
pub(crate) fn with_pin(
    mut pins: IndexMap<String, String>,
    label: &str,
    pin: &str,
) -> Result<IndexMap<String, String>, CoreError> {
    if pin.len() != PIN_LENGTH {
        return Err(pin_error(format!("PINs must be {PIN_LENGTH} digits long")));
    }
    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(pin_error("PINs can only contain numbers"));
    }
    if pins.values().any(|existing| existing == pin) {
        return Err(pin_error(format!("Refusing to create duplicate PIN: {pin}")));
    }

    let max_pins = MAX_USER_PINS + RESERVED_PIN_LABELS.len();
    if pins.len() >= max_pins && !is_reserved(label) && !pins.contains_key(label) {
        return Err(pin_error(format!(
            "Refusing to create more than {MAX_USER_PINS} user PINs"
        )));
    }

    pins.insert(label.to_owned(), pin.to_owned());
    Ok(pins)
}

/// Return `pins` without the entry whose label or value is `pin_or_label`.
pub(crate) fn without_pin(
    mut pins: IndexMap<String, String>,
    pin_or_label: &str,
) -> Result<IndexMap<String, String>, CoreError> {
    let label = pins
        .iter()
        .find(|(label, pin)| label.as_str() == pin_or_label || pin.as_str() == pin_or_label)
        .map(|(label, _)| label.clone())
        .ok_or_else(|| pin_error(format!("Cannot delete nonexistent PIN: {pin_or_label}")))?;

    if is_reserved(&label) {
        return Err(pin_error(format!("Refusing to delete reserved PIN: {label}")));
    }

    pins.shift_remove(&label);
    Ok(pins)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn table(users: &[(&str, &str)]) -> IndexMap<String, String> {
        let mut pins = IndexMap::new();
        pins.insert("master".to_owned(), "1234".to_owned());
        pins.insert("duress".to_owned(), "9876".to_owned());
        for (label, pin) in users {
            pins.insert((*label).to_owned(), (*pin).to_owned());
        }
        pins
    }

    #[test]
    fn adds_a_valid_pin() {
        let pins = with_pin(table(&[]), "Mother", "3456").unwrap();
        assert_eq!(pins["Mother"], "3456");
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(matches!(with_pin(table(&[]), "a", "123"), Err(CoreError::Pin { .. })));
        assert!(matches!(with_pin(table(&[]), "a", "12a4"), Err(CoreError::Pin { .. })));
        assert!(matches!(with_pin(table(&[]), "a", "1234"), Err(CoreError::Pin { .. })));
    }

    #[test]
    fn caps_user_pins() {
        let full = table(&[("a", "1111"), ("b", "2222"), ("c", "3333"), ("d", "4444")]);
        assert!(matches!(with_pin(full.clone(), "e", "5555"), Err(CoreError::Pin { .. })));
        // Replacing an existing label is not growth.
        assert!(with_pin(full, "a", "5555").is_ok());
    }

    #[test]
    fn removes_by_label_or_value() {
        let pins = table(&[("Mother", "3456"), ("Father", "4567")]);
        let pins = without_pin(pins, "Mother").unwrap();
        let pins = without_pin(pins, "4567").unwrap();
        assert_eq!(pins.len(), 2);
    }

    #[test]
    fn reserved_and_missing_pins_are_not_removed() {
        assert!(matches!(without_pin(table(&[]), "master"), Err(CoreError::Pin { .. })));
        assert!(matches!(without_pin(table(&[]), "9876"), Err(CoreError::Pin { .. })));
        assert!(matches!(without_pin(table(&[]), "nobody"), Err(CoreError::Pin { .. })));
    }
}
