//! Virtual accumulator cache: a direct-mapped table of intermediate
//! expression results, keyed by the low 12 bits of the producing
//! instruction's address.
//!
//! The HAL/S compiler never lets two live values share the same
//! instruction-address-mod-4096 slot at once, so no replacement policy is
//! needed — see `spec.md` §9 and [`Engine::store_vac`]/[`Engine::read_vac`]
//! in [`super`].

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::value::Value;

    #[test]
    fn vac_is_direct_mapped_by_low_bits() {
        let mut e = Engine::new();
        e.store_vac(10, Value::Integer(1));
        e.store_vac(10 + 4096, Value::Integer(2));
        // Same slot: later store wins.
        assert_eq!(e.read_vac(10), Value::Integer(2));
    }
}
