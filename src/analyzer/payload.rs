/**
* filename : payload
* description: Decoder for the OP_RETURN routing payload attached to deposits.
**/

use bitcoin::script::Instruction;
use bitcoin::Script;
use std::fmt;

/// First push of every routing payload.
pub const PAYLOAD_MAGIC: [u8; 4] = [0x00, 0x66, 0x67, 0x70];

const PAYLOAD_PUSHES: usize = 4;

/// Cross-chain routing instruction carried by a data output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
  pub chain_name: String,
  pub address: String,
  pub app_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
  Script(String),
  PushCount(usize),
  Magic,
  AppNumber(usize),
}

impl fmt::Display for PayloadError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PayloadError::Script(e) => write!(f, "unparsable script: {}", e),
      PayloadError::PushCount(n) => write!(f, "expected {} pushes, found {}", PAYLOAD_PUSHES, n),
      PayloadError::Magic => write!(f, "magic prefix mismatch"),
      PayloadError::AppNumber(len) => write!(f, "app number must be 4 bytes, got {}", len),
    }
  }
}

impl std::error::Error for PayloadError {}

/// Pushed data elements of a script; opcodes are skipped.
fn pushed_data(script: &Script) -> Result<Vec<&[u8]>, PayloadError> {
  let mut pushes = Vec::new();
  for instruction in script.instructions() {
    match instruction.map_err(|e| PayloadError::Script(e.to_string()))? {
      Instruction::PushBytes(bytes) => pushes.push(bytes.as_bytes()),
      Instruction::Op(_) => {}
    }
  }
  Ok(pushes)
}

/// Parses `[magic][chain name][u32 BE app number][address]`. Anything else is
/// rejected; callers treat a rejection as "not a routing output".
pub fn parse_payload_script(script: &Script) -> Result<Message, PayloadError> {
  let pushes = pushed_data(script)?;
  if pushes.len() != PAYLOAD_PUSHES {
    return Err(PayloadError::PushCount(pushes.len()));
  }
  if pushes[0] != PAYLOAD_MAGIC {
    return Err(PayloadError::Magic);
  }

  let app_bytes: [u8; 4] = pushes[2]
    .try_into()
    .map_err(|_| PayloadError::AppNumber(pushes[2].len()))?;

  Ok(Message {
    chain_name: String::from_utf8_lossy(pushes[1]).into_owned(),
    app_number: u32::from_be_bytes(app_bytes),
    address: String::from_utf8_lossy(pushes[3]).into_owned(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use bitcoin::opcodes::all::OP_RETURN;
  use bitcoin::script::{Builder, PushBytesBuf};
  use bitcoin::ScriptBuf;

  fn payload(pushes: &[&[u8]]) -> ScriptBuf {
    let mut builder = Builder::new().push_opcode(OP_RETURN);
    for push in pushes {
      builder = builder.push_slice(PushBytesBuf::try_from(push.to_vec()).unwrap());
    }
    builder.into_script()
  }

  #[test]
  fn parses_well_formed_payload() {
    let script = payload(&[&PAYLOAD_MAGIC, b"ETH", &7u32.to_be_bytes(), b"0xabc"]);
    let message = parse_payload_script(&script).unwrap();
    assert_eq!(
      message,
      Message {
        chain_name: "ETH".to_string(),
        address: "0xabc".to_string(),
        app_number: 7,
      }
    );
  }

  #[test]
  fn app_number_is_big_endian() {
    let script = payload(&[&PAYLOAD_MAGIC, b"ETH", &[0x00, 0x00, 0x01, 0x02], b"0xabc"]);
    assert_eq!(parse_payload_script(&script).unwrap().app_number, 258);
  }

  #[test]
  fn wrong_magic_is_rejected_whatever_follows() {
    for magic in [[0x00u8, 0x66, 0x67, 0x71], [0xff, 0x66, 0x67, 0x70]] {
      let script = payload(&[&magic, b"ETH", &7u32.to_be_bytes(), b"0xabc"]);
      assert_eq!(parse_payload_script(&script), Err(PayloadError::Magic));
    }
    let script = payload(&[b"fgp", b"ETH", &7u32.to_be_bytes(), b"0xabc"]);
    assert_eq!(parse_payload_script(&script), Err(PayloadError::Magic));
  }

  #[test]
  fn arity_mismatch_is_rejected() {
    let three = payload(&[&PAYLOAD_MAGIC, b"ETH", &7u32.to_be_bytes()]);
    assert_eq!(parse_payload_script(&three), Err(PayloadError::PushCount(3)));

    let five = payload(&[&PAYLOAD_MAGIC, b"ETH", &7u32.to_be_bytes(), b"0xabc", b"x"]);
    assert_eq!(parse_payload_script(&five), Err(PayloadError::PushCount(5)));
  }

  #[test]
  fn short_app_number_is_rejected() {
    let script = payload(&[&PAYLOAD_MAGIC, b"ETH", &[7u8, 0], b"0xabc"]);
    assert_eq!(parse_payload_script(&script), Err(PayloadError::AppNumber(2)));
  }

  #[test]
  fn truncated_push_is_rejected() {
    // OP_RETURN, then a push of 10 bytes with only 2 present
    let script = ScriptBuf::from_bytes(vec![0x6a, 0x0a, 0x01, 0x02]);
    assert!(matches!(parse_payload_script(&script), Err(PayloadError::Script(_))));
  }
}
