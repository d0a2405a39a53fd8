//! Cheat code decoders
//!
//! Every family decodes a (possibly multi-line) code into a list of
//! [`PatchOp`]s. Separator characters are ignored for fixed-layout families;
//! the raw families use `:` and `?` as field delimiters.

use crate::memory::{AddressSpace, Width};
use crate::patch::{Condition, PatchOp};
use rb_core::{CheatError, CheatFamily};

/// Canonical form of a code: upper-cased, one line per `\n`, blank lines
/// and surrounding whitespace removed
pub fn normalize(code: &str) -> String {
    code.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_ascii_uppercase)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode `code` written in `family`'s dialect
pub fn decode(family: CheatFamily, code: &str) -> Result<Vec<PatchOp>, CheatError> {
    let normalized = normalize(code);
    if normalized.is_empty() {
        return Err(CheatError::InvalidCode("empty code".to_string()));
    }

    let lines: Vec<&str> = normalized.lines().collect();
    match family {
        CheatFamily::Raw => lines.iter().map(|line| decode_raw(line)).collect(),
        CheatFamily::RawCompare => lines.iter().map(|line| decode_raw_compare(line)).collect(),
        CheatFamily::GameGenie => {
            let chunks = fixed_chunks(&lines, family, &[6, 8])?;
            chunks.iter().map(|chunk| decode_game_genie(chunk)).collect()
        }
        CheatFamily::ProActionReplay => {
            let chunks = fixed_chunks(&lines, family, &[8])?;
            chunks.iter().map(|chunk| decode_pro_action_replay(chunk)).collect()
        }
        CheatFamily::GameSharkN64 => {
            let chunks = fixed_chunks(&lines, family, &[12])?;
            decode_gameshark_n64(&chunks)
        }
        CheatFamily::GameSharkGbc => {
            let chunks = fixed_chunks(&lines, family, &[8])?;
            chunks.iter().map(|chunk| decode_gameshark_gbc(chunk)).collect()
        }
        CheatFamily::ActionReplayDs => {
            let chunks = fixed_chunks(&lines, family, &[16])?;
            chunks.iter().map(|chunk| decode_action_replay_ds(chunk)).collect()
        }
    }
}

fn invalid(reason: impl Into<String>) -> CheatError {
    CheatError::InvalidCode(reason.into())
}

/// Strip separators from every line and check each against the allowed
/// lengths. A line may also hold several codes back to back as long as its
/// length is a multiple of the first allowed length.
fn fixed_chunks(
    lines: &[&str],
    family: CheatFamily,
    lengths: &[usize],
) -> Result<Vec<String>, CheatError> {
    let mut chunks = Vec::new();
    for line in lines {
        let stripped: String = line.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        if lengths.contains(&stripped.len()) {
            chunks.push(stripped);
        } else if !stripped.is_empty() && stripped.len() % lengths[0] == 0 {
            let bytes = stripped.as_bytes();
            for chunk in bytes.chunks(lengths[0]) {
                chunks.push(String::from_utf8_lossy(chunk).into_owned());
            }
        } else {
            return Err(invalid(format!(
                "'{}' does not match {} format {}",
                line,
                family,
                family.format()
            )));
        }
    }
    Ok(chunks)
}

fn parse_hex(field: &str) -> Result<u32, CheatError> {
    if field.is_empty() || field.len() > 8 {
        return Err(invalid(format!("bad hex field '{}'", field)));
    }
    u32::from_str_radix(field, 16).map_err(|_| invalid(format!("bad hex field '{}'", field)))
}

fn parse_value(field: &str) -> Result<(u32, Width), CheatError> {
    let width = Width::for_hex_digits(field.len())
        .ok_or_else(|| invalid(format!("bad value '{}'", field)))?;
    Ok((parse_hex(field)?, width))
}

/// `AAAAAAAA:VV`
fn decode_raw(line: &str) -> Result<PatchOp, CheatError> {
    let (address, value) = line
        .split_once(':')
        .ok_or_else(|| invalid(format!("'{}' is missing ':'", line)))?;
    let address = parse_hex(address.trim())?;
    let (value, width) = parse_value(value.trim())?;
    Ok(PatchOp::set(AddressSpace::Main, address, width, value))
}

/// `AAAA?CC:VV`
fn decode_raw_compare(line: &str) -> Result<PatchOp, CheatError> {
    let (address, rest) = line
        .split_once('?')
        .ok_or_else(|| invalid(format!("'{}' is missing '?'", line)))?;
    let (compare, value) = rest
        .split_once(':')
        .ok_or_else(|| invalid(format!("'{}' is missing ':'", line)))?;

    let address = parse_hex(address.trim())?;
    let (compare, compare_width) = parse_value(compare.trim())?;
    let (value, width) = parse_value(value.trim())?;
    if compare_width != width {
        return Err(invalid("compare and value widths differ"));
    }

    let mut op = PatchOp::set(AddressSpace::Main, address, width, value);
    op.condition = Some(Condition {
        space: AddressSpace::Main,
        address,
        width,
        equals: compare,
    });
    Ok(op)
}

const GAME_GENIE_LETTERS: &[u8; 16] = b"APZLGITYEOXUKSVN";

/// NES Game Genie, 6 letters (address/value) or 8 letters (with compare)
fn decode_game_genie(code: &str) -> Result<PatchOp, CheatError> {
    let n: Vec<u32> = code
        .bytes()
        .map(|c| {
            GAME_GENIE_LETTERS
                .iter()
                .position(|&l| l == c)
                .map(|p| p as u32)
                .ok_or_else(|| invalid(format!("'{}' is not a Game Genie letter", c as char)))
        })
        .collect::<Result<_, _>>()?;

    let address = 0x8000
        + (((n[3] & 7) << 12)
            | ((n[5] & 7) << 8)
            | ((n[4] & 8) << 8)
            | ((n[2] & 7) << 4)
            | ((n[1] & 8) << 4)
            | (n[4] & 7)
            | (n[3] & 8));

    if n.len() == 6 {
        let value = ((n[1] & 7) << 4) | ((n[0] & 8) << 4) | (n[0] & 7) | (n[5] & 8);
        Ok(PatchOp::set(AddressSpace::Rom, address, Width::U8, value))
    } else {
        let value = ((n[1] & 7) << 4) | ((n[0] & 8) << 4) | (n[0] & 7) | (n[7] & 8);
        let compare = ((n[7] & 7) << 4) | ((n[6] & 8) << 4) | (n[6] & 7) | (n[5] & 8);
        let mut op = PatchOp::set(AddressSpace::Rom, address, Width::U8, value);
        op.condition = Some(Condition {
            space: AddressSpace::Rom,
            address,
            width: Width::U8,
            equals: compare,
        });
        Ok(op)
    }
}

/// SNES Pro Action Replay, `AAAAAAVV`
fn decode_pro_action_replay(code: &str) -> Result<PatchOp, CheatError> {
    let address = parse_hex(&code[..6])?;
    let value = parse_hex(&code[6..])?;
    Ok(PatchOp::set(AddressSpace::Main, address, Width::U8, value))
}

/// N64 GameShark, `TTAAAAAA VVVV`. `D0`/`D1` lines guard the following write.
fn decode_gameshark_n64(chunks: &[String]) -> Result<Vec<PatchOp>, CheatError> {
    let mut ops = Vec::new();
    let mut pending: Option<Condition> = None;

    for chunk in chunks {
        let head = parse_hex(&chunk[..8])?;
        let value = parse_hex(&chunk[8..])?;
        let code_type = head >> 24;
        let address = head & 0x00FF_FFFF;

        match code_type {
            0x80 | 0xA0 | 0x81 | 0xA1 => {
                let width = if code_type & 1 == 0 { Width::U8 } else { Width::U16 };
                let mut op = PatchOp::set(AddressSpace::Main, address, width, value);
                op.condition = pending.take();
                ops.push(op);
            }
            0xD0 | 0xD1 => {
                if pending.is_some() {
                    return Err(invalid("conditional followed by conditional"));
                }
                let width = if code_type == 0xD0 { Width::U8 } else { Width::U16 };
                pending = Some(Condition {
                    space: AddressSpace::Main,
                    address,
                    width,
                    equals: value & width.mask(),
                });
            }
            other => {
                return Err(invalid(format!(
                    "unsupported GameShark code type {:02X}",
                    other
                )))
            }
        }
    }

    if pending.is_some() {
        return Err(invalid("conditional without a following write"));
    }
    Ok(ops)
}

/// Game Boy GameShark, `TTVVAAAA` with a byte-swapped address
fn decode_gameshark_gbc(code: &str) -> Result<PatchOp, CheatError> {
    let code_type = parse_hex(&code[..2])?;
    if code_type > 0x01 {
        return Err(invalid(format!(
            "unsupported GameShark code type {:02X}",
            code_type
        )));
    }
    let value = parse_hex(&code[2..4])?;
    let low = parse_hex(&code[4..6])?;
    let high = parse_hex(&code[6..8])?;
    Ok(PatchOp::set(
        AddressSpace::Main,
        (high << 8) | low,
        Width::U8,
        value,
    ))
}

/// DS Action Replay, `XAAAAAAA YYYYYYYY` with write types 0/1/2
fn decode_action_replay_ds(code: &str) -> Result<PatchOp, CheatError> {
    let head = parse_hex(&code[..8])?;
    let value = parse_hex(&code[8..])?;
    let address = head & 0x0FFF_FFFF;

    let width = match head >> 28 {
        0x0 => Width::U32,
        0x1 => Width::U16,
        0x2 => Width::U8,
        other => {
            return Err(invalid(format!(
                "unsupported Action Replay code type {:X}",
                other
            )))
        }
    };
    Ok(PatchOp::set(AddressSpace::Main, address, width, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  sxiopo \n\n  aaaa-bbbb "), "SXIOPO\nAAAA-BBBB");
    }

    #[test]
    fn test_raw() {
        let ops = decode(CheatFamily::Raw, "7E0DBE:09").unwrap();
        assert_eq!(ops, vec![PatchOp::set(AddressSpace::Main, 0x7E0DBE, Width::U8, 0x09)]);

        let ops = decode(CheatFamily::Raw, "0100:1234\n0200:DEADBEEF").unwrap();
        assert_eq!(ops[0].width, Width::U16);
        assert_eq!(ops[1].width, Width::U32);
        assert_eq!(ops[1].value, 0xDEADBEEF);

        assert!(decode(CheatFamily::Raw, "0100").is_err());
        assert!(decode(CheatFamily::Raw, "01G0:12").is_err());
        assert!(decode(CheatFamily::Raw, "").is_err());
    }

    #[test]
    fn test_raw_compare() {
        let ops = decode(CheatFamily::RawCompare, "0075?03:09").unwrap();
        let cond = ops[0].condition.unwrap();
        assert_eq!(cond.address, 0x75);
        assert_eq!(cond.equals, 0x03);
        assert_eq!(ops[0].value, 0x09);

        assert!(decode(CheatFamily::RawCompare, "0075:09").is_err());
        assert!(decode(CheatFamily::RawCompare, "0075?0003:09").is_err());
    }

    #[test]
    fn test_game_genie_six_letters() {
        // Super Mario Bros. infinite lives
        let ops = decode(CheatFamily::GameGenie, "SXIOPO").unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].space, AddressSpace::Rom);
        assert_eq!(ops[0].address, 0x91D9);
        assert_eq!(ops[0].value, 0xAD);
        assert!(ops[0].condition.is_none());
    }

    #[test]
    fn test_game_genie_eight_letters_have_compare() {
        let ops = decode(CheatFamily::GameGenie, "YEUZUGAA").unwrap();
        let cond = ops[0].condition.unwrap();
        assert_eq!(cond.address, ops[0].address);
        assert!(ops[0].address >= 0x8000);
    }

    #[test]
    fn test_game_genie_rejects_bad_letters() {
        assert!(decode(CheatFamily::GameGenie, "SXIOPB").is_err());
        assert!(decode(CheatFamily::GameGenie, "SXIOP").is_err());
    }

    #[test]
    fn test_multiple_codes_on_one_line() {
        let ops = decode(CheatFamily::GameGenie, "SXIOPO-SXIOPO").unwrap();
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn test_pro_action_replay() {
        let ops = decode(CheatFamily::ProActionReplay, "7E0DBE09").unwrap();
        assert_eq!(ops[0].address, 0x7E0DBE);
        assert_eq!(ops[0].value, 0x09);
    }

    #[test]
    fn test_gameshark_n64() {
        let ops = decode(CheatFamily::GameSharkN64, "8033B21D 0064\n8133B21E 1234").unwrap();
        assert_eq!(ops[0].width, Width::U8);
        assert_eq!(ops[0].address, 0x33B21D);
        assert_eq!(ops[0].value, 0x64);
        assert_eq!(ops[1].width, Width::U16);
        assert_eq!(ops[1].value, 0x1234);
    }

    #[test]
    fn test_gameshark_n64_conditional() {
        let ops = decode(CheatFamily::GameSharkN64, "D033AFA1 0020\n8033B248 0000").unwrap();
        assert_eq!(ops.len(), 1);
        let cond = ops[0].condition.unwrap();
        assert_eq!(cond.address, 0x33AFA1);
        assert_eq!(cond.equals, 0x20);

        assert!(decode(CheatFamily::GameSharkN64, "D033AFA1 0020").is_err());
        assert!(decode(CheatFamily::GameSharkN64, "5000030C 0000").is_err());
    }

    #[test]
    fn test_gameshark_gbc() {
        let ops = decode(CheatFamily::GameSharkGbc, "01FF34C2").unwrap();
        assert_eq!(ops[0].address, 0xC234);
        assert_eq!(ops[0].value, 0xFF);
        assert!(decode(CheatFamily::GameSharkGbc, "91FF34C2").is_err());
    }

    #[test]
    fn test_action_replay_ds() {
        let ops = decode(
            CheatFamily::ActionReplayDs,
            "02000000 12345678\n12000004 0000BEEF\n22000008 000000AA",
        )
        .unwrap();
        assert_eq!(ops[0].width, Width::U32);
        assert_eq!(ops[0].address, 0x02000000);
        assert_eq!(ops[0].value, 0x12345678);
        assert_eq!(ops[1].width, Width::U16);
        assert_eq!(ops[1].value, 0xBEEF);
        assert_eq!(ops[2].width, Width::U8);
        assert_eq!(ops[2].value, 0xAA);

        assert!(decode(CheatFamily::ActionReplayDs, "D2000000 00000000").is_err());
        assert!(decode(CheatFamily::ActionReplayDs, "02000000 1234").is_err());
    }
}
