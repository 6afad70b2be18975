//! Decodes an order output's inline CBOR datum into the fields needed to
//! construct an `OrderState` (spec §4.3 step 3). The nested
//! `Constr`-tag field-indexing approach and the tag-121/122 convention
//! are the same ones a Plutus order-book datum always uses; this module
//! pulls whichever fields an `OrderState` needs, in schema order.

use ciborium::value::Value;

use crate::core::asset::{AssetId, Rational};
use crate::core::order::ContainedFee;
use crate::error::DecodeError;

const CONSTR_0_TAG: u64 = 121;
const CONSTR_1_TAG: u64 = 122;

/// Decode a CBOR byte string into a `ciborium::Value`.
pub fn decode_cbor(bytes: &[u8]) -> Result<Value, DecodeError> {
    ciborium::de::from_reader(bytes).map_err(|e| DecodeError::MalformedCbor(e.to_string()))
}

/// Unwrap a `Tag(121 | 122, [...])` constructor into its field list,
/// returning the constructor's tag number alongside it.
fn constr(value: &Value) -> Result<(u64, &Vec<Value>), DecodeError> {
    match value {
        Value::Tag(tag, inner) => match inner.as_ref() {
            Value::Array(fields) if *tag == CONSTR_0_TAG || *tag == CONSTR_1_TAG => Ok((*tag, fields)),
            _ => Err(DecodeError::MalformedCbor("constructor tag did not wrap an array".to_string())),
        },
        _ => Err(DecodeError::MalformedCbor("expected a constructor tag".to_string())),
    }
}

/// Like `constr`, but also asserts the tag is 0 (maps to CBOR tag 121).
fn constr0_fields(value: &Value) -> Result<&Vec<Value>, DecodeError> {
    let (tag, fields) = constr(value)?;
    if tag != CONSTR_0_TAG {
        return Err(DecodeError::UnexpectedConstructor {
            expected: 0,
            actual: tag - CONSTR_0_TAG,
        });
    }
    Ok(fields)
}

fn field<'a>(fields: &'a [Value], index: usize, name: &'static str) -> Result<&'a Value, DecodeError> {
    fields.get(index).ok_or(DecodeError::MissingField(name))
}

fn value_to_bytes(value: &Value, name: &'static str) -> Result<Vec<u8>, DecodeError> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        _ => Err(DecodeError::InvalidField {
            field: name,
            reason: "expected a byte string".to_string(),
        }),
    }
}

fn value_to_u64(value: &Value, name: &'static str) -> Result<u64, DecodeError> {
    match value {
        Value::Integer(i) => u64::try_from(*i).map_err(|_| DecodeError::InvalidField {
            field: name,
            reason: "integer out of range for u64".to_string(),
        }),
        _ => Err(DecodeError::InvalidField {
            field: name,
            reason: "expected an integer".to_string(),
        }),
    }
}

fn value_to_i64(value: &Value, name: &'static str) -> Result<i64, DecodeError> {
    match value {
        Value::Integer(i) => i64::try_from(*i).map_err(|_| DecodeError::InvalidField {
            field: name,
            reason: "integer out of range for i64".to_string(),
        }),
        _ => Err(DecodeError::InvalidField {
            field: name,
            reason: "expected an integer".to_string(),
        }),
    }
}

/// An optional `Constr(0, [int]) | Constr(1, [])` field: `Some(n)` or
/// `None` (the ChadSwap-style null encoding).
fn optional_i64(value: &Value, name: &'static str) -> Result<Option<i64>, DecodeError> {
    let (tag, fields) = constr(value)?;
    if tag == CONSTR_1_TAG || fields.is_empty() {
        return Ok(None);
    }
    Ok(Some(value_to_i64(field(fields, 0, name)?, name)?))
}

/// The fields of an on-chain order's datum needed to populate an
/// `OrderState` (spec §3 "Preserved datum fields").
pub struct OrderDatum {
    pub owner_key: Vec<u8>,
    pub nft: Vec<u8>,
    pub offered_asset: AssetId,
    pub asked_asset: AssetId,
    pub price: Rational,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub offered_amount: u64,
    pub original_amount: u64,
    pub partial_fills: u32,
    pub flat_fee: u64,
    pub percent_fee_ppm: u64,
    pub percent_fee_max: u64,
    pub contained_fee: ContainedFee,
    pub contained_payment: u64,
    pub maker_fee: Rational,
}

/// Decodes the datum's `Constr(0, [...])` field list, in schema order:
/// owner key, NFT name, offered policy/name, asked policy/name, price
/// num/den, optional start/end time, offered/original amount, partial
/// fill count, flat/percent/max fee, contained fee triple, contained
/// payment, maker fee num/den.
pub fn decode_order_datum(cbor_bytes: &[u8]) -> Result<OrderDatum, DecodeError> {
    let value = decode_cbor(cbor_bytes)?;
    let fields = constr0_fields(&value)?;

    let owner_key = value_to_bytes(field(fields, 0, "owner_key")?, "owner_key")?;
    let nft = value_to_bytes(field(fields, 1, "nft")?, "nft")?;
    if nft.is_empty() {
        return Err(DecodeError::EmptyNftName);
    }
    let offered_policy = value_to_bytes(field(fields, 2, "offered_policy")?, "offered_policy")?;
    let offered_name = value_to_bytes(field(fields, 3, "offered_name")?, "offered_name")?;
    let asked_policy = value_to_bytes(field(fields, 4, "asked_policy")?, "asked_policy")?;
    let asked_name = value_to_bytes(field(fields, 5, "asked_name")?, "asked_name")?;
    let price_num = value_to_i64(field(fields, 6, "price_num")?, "price_num")?;
    let price_den = value_to_i64(field(fields, 7, "price_den")?, "price_den")?;
    if price_den <= 0 {
        return Err(DecodeError::InvalidField {
            field: "price_den",
            reason: "denominator must be > 0".to_string(),
        });
    }
    let start_time = optional_i64(field(fields, 8, "start_time")?, "start_time")?;
    let end_time = optional_i64(field(fields, 9, "end_time")?, "end_time")?;
    let offered_amount = value_to_u64(field(fields, 10, "offered_amount")?, "offered_amount")?;
    let original_amount = value_to_u64(field(fields, 11, "original_amount")?, "original_amount")?;
    let partial_fills = value_to_u64(field(fields, 12, "partial_fills")?, "partial_fills")? as u32;
    let flat_fee = value_to_u64(field(fields, 13, "flat_fee")?, "flat_fee")?;
    let percent_fee_ppm = value_to_u64(field(fields, 14, "percent_fee_ppm")?, "percent_fee_ppm")?;
    let percent_fee_max = value_to_u64(field(fields, 15, "percent_fee_max")?, "percent_fee_max")?;
    let contained_fee_lovelace = value_to_u64(field(fields, 16, "contained_fee_lovelace")?, "contained_fee_lovelace")?;
    let contained_fee_offered = value_to_u64(field(fields, 17, "contained_fee_offered")?, "contained_fee_offered")?;
    let contained_fee_asked = value_to_u64(field(fields, 18, "contained_fee_asked")?, "contained_fee_asked")?;
    let contained_payment = value_to_u64(field(fields, 19, "contained_payment")?, "contained_payment")?;
    let maker_fee_num = value_to_i64(field(fields, 20, "maker_fee_num")?, "maker_fee_num")?;
    let maker_fee_den = value_to_i64(field(fields, 21, "maker_fee_den")?, "maker_fee_den")?;
    if maker_fee_den <= 0 {
        return Err(DecodeError::InvalidField {
            field: "maker_fee_den",
            reason: "denominator must be > 0".to_string(),
        });
    }

    Ok(OrderDatum {
        owner_key,
        nft,
        offered_asset: AssetId::new(offered_policy, offered_name),
        asked_asset: AssetId::new(asked_policy, asked_name),
        price: Rational::new(price_num, price_den),
        start_time,
        end_time,
        offered_amount,
        original_amount,
        partial_fills,
        flat_fee,
        percent_fee_ppm,
        percent_fee_max,
        contained_fee: ContainedFee {
            lovelace: contained_fee_lovelace,
            offered: contained_fee_offered,
            asked: contained_fee_asked,
        },
        contained_payment,
        maker_fee: Rational::new(maker_fee_num, maker_fee_den),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciborium::value::Value as V;

    fn constr0(fields: Vec<V>) -> V {
        V::Tag(CONSTR_0_TAG, Box::new(V::Array(fields)))
    }

    fn constr1(fields: Vec<V>) -> V {
        V::Tag(CONSTR_1_TAG, Box::new(V::Array(fields)))
    }

    fn sample_datum_value() -> V {
        constr0(vec![
            V::Bytes(vec![0xAA; 28]),             // owner_key
            V::Bytes(b"orderNft".to_vec()),       // nft
            V::Bytes(vec![0x01]),                 // offered_policy
            V::Bytes(b"TKN".to_vec()),            // offered_name
            V::Bytes(vec![]),                     // asked_policy (native)
            V::Bytes(vec![]),                     // asked_name (native)
            V::Integer(2.into()),                 // price_num
            V::Integer(1.into()),                 // price_den
            constr1(vec![]),                       // start_time: null
            constr0(vec![V::Integer(2_000_000_000.into())]), // end_time: Some
            V::Integer(1_000_000.into()),         // offered_amount
            V::Integer(1_000_000.into()),         // original_amount
            V::Integer(0.into()),                 // partial_fills
            V::Integer(0.into()),                 // flat_fee
            V::Integer(0.into()),                 // percent_fee_ppm
            V::Integer(0.into()),                 // percent_fee_max
            V::Integer(0.into()),                 // contained_fee_lovelace
            V::Integer(0.into()),                 // contained_fee_offered
            V::Integer(0.into()),                 // contained_fee_asked
            V::Integer(0.into()),                 // contained_payment
            V::Integer(0.into()),                 // maker_fee_num
            V::Integer(1.into()),                 // maker_fee_den
        ])
    }

    fn encode(value: &V) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(value, &mut buf).unwrap();
        buf
    }

    #[test]
    fn decodes_a_well_formed_order_datum() {
        let bytes = encode(&sample_datum_value());
        let datum = decode_order_datum(&bytes).unwrap();
        assert_eq!(datum.nft, b"orderNft");
        assert!(datum.offered_asset.fingerprint().starts_with("01"));
        assert!(datum.asked_asset.is_native());
        assert_eq!(datum.price, Rational::new(2, 1));
        assert_eq!(datum.start_time, None);
        assert_eq!(datum.end_time, Some(2_000_000_000));
        assert_eq!(datum.offered_amount, 1_000_000);
    }

    #[test]
    fn rejects_empty_nft_name() {
        let mut value = sample_datum_value();
        if let V::Tag(_, inner) = &mut value {
            if let V::Array(fields) = inner.as_mut() {
                fields[1] = V::Bytes(vec![]);
            }
        }
        let bytes = encode(&value);
        let err = decode_order_datum(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::EmptyNftName));
    }

    #[test]
    fn rejects_malformed_cbor() {
        let err = decode_order_datum(&[0xff, 0x00]).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedCbor(_)));
    }

    #[test]
    fn rejects_missing_field() {
        let value = constr0(vec![V::Bytes(vec![0xAA; 28])]);
        let bytes = encode(&value);
        let err = decode_order_datum(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("nft")));
    }
}
