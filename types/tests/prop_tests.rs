use proptest::prelude::*;

use tessel_types::{sha256, Tx, TxHash};

proptest! {
    /// TxHash roundtrip: new -> as_bytes -> new produces identical hash.
    #[test]
    fn tx_hash_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = TxHash::new(bytes);
        prop_assert_eq!(hash.as_bytes(), &bytes);
    }

    /// Display -> FromStr is lossless.
    #[test]
    fn tx_hash_display_parse_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = TxHash::new(bytes);
        prop_assert_eq!(hash.to_string().parse::<TxHash>().unwrap(), hash);
    }

    /// A transaction's hash and mempool key are derived from the same digest.
    #[test]
    fn tx_key_matches_hash(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let tx = Tx::new(bytes.clone());
        let key = tx.key();
        let hash = tx.hash();
        prop_assert_eq!(key.as_bytes(), hash.as_bytes());
        prop_assert_eq!(hash.as_bytes(), &sha256(&bytes));
    }
}
