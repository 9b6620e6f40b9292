// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compress a [`json_patch::Patch`] into the wire's flat positional array
//! encoding, and decompress it back.
//!
//! Each operation becomes `[opcode, path, third?]`:
//!
//! | opcode | op      | third       |
//! |--------|---------|-------------|
//! | 0      | remove  | —           |
//! | 1      | add     | value       |
//! | 2      | replace | value       |
//! | 3      | test    | value       |
//! | 4      | move    | from        |
//! | 5      | copy    | from        |
//!
//! This halves the bytes of the verbose `{"op": "...", "path": "...", ...}`
//! shape for the common case of many small per-render patches.

use json_patch::{AddOperation, CopyOperation, MoveOperation, Patch, PatchOperation, RemoveOperation, ReplaceOperation, TestOperation};
use jsonptr::PointerBuf;
use ld_core::error::{ErrorCode, LiveDataError};
use serde_json::Value;

const OP_REMOVE: u8 = 0;
const OP_ADD: u8 = 1;
const OP_REPLACE: u8 = 2;
const OP_TEST: u8 = 3;
const OP_MOVE: u8 = 4;
const OP_COPY: u8 = 5;

/// Compress a patch into the wire's array-of-arrays shape.
#[must_use]
pub fn compress(patch: &Patch) -> Vec<Value> {
    patch.0.iter().map(compress_one).collect()
}

fn compress_one(op: &PatchOperation) -> Value {
    match op {
        PatchOperation::Remove(RemoveOperation { path }) => {
            Value::Array(vec![Value::from(OP_REMOVE), Value::from(path.to_string())])
        }
        PatchOperation::Add(AddOperation { path, value }) => Value::Array(vec![
            Value::from(OP_ADD),
            Value::from(path.to_string()),
            value.clone(),
        ]),
        PatchOperation::Replace(ReplaceOperation { path, value }) => Value::Array(vec![
            Value::from(OP_REPLACE),
            Value::from(path.to_string()),
            value.clone(),
        ]),
        PatchOperation::Test(TestOperation { path, value }) => Value::Array(vec![
            Value::from(OP_TEST),
            Value::from(path.to_string()),
            value.clone(),
        ]),
        PatchOperation::Move(MoveOperation { path, from }) => Value::Array(vec![
            Value::from(OP_MOVE),
            Value::from(path.to_string()),
            Value::from(from.to_string()),
        ]),
        PatchOperation::Copy(CopyOperation { path, from }) => Value::Array(vec![
            Value::from(OP_COPY),
            Value::from(path.to_string()),
            Value::from(from.to_string()),
        ]),
    }
}

/// Decompress a wire-shaped array of arrays back into a [`Patch`].
///
/// # Errors
///
/// Returns [`ErrorCode::UnknownOpcode`] for an opcode outside `0..=5`, and
/// [`ErrorCode::TruncatedPatch`] if an operation is missing its path or its
/// required third element.
pub fn decompress(value: &Value) -> Result<Patch, LiveDataError> {
    let entries = value.as_array().ok_or_else(|| {
        LiveDataError::new(ErrorCode::TruncatedPatch, "compressed patch must be an array")
    })?;
    let ops = entries.iter().map(decompress_one).collect::<Result<_, _>>()?;
    Ok(Patch(ops))
}

fn decompress_one(entry: &Value) -> Result<PatchOperation, LiveDataError> {
    let fields = entry.as_array().ok_or_else(|| {
        LiveDataError::new(ErrorCode::TruncatedPatch, "patch entry must be an array")
    })?;

    let opcode = fields
        .first()
        .and_then(Value::as_u64)
        .ok_or_else(|| truncated("missing opcode"))?;
    let path = fields
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| truncated("missing path"))?;
    let path = PointerBuf::parse(path)
        .map_err(|e| truncated("path").with_context("parse_error", e.to_string()))?;

    match u8::try_from(opcode).unwrap_or(u8::MAX) {
        OP_REMOVE => Ok(PatchOperation::Remove(RemoveOperation { path })),
        OP_ADD => Ok(PatchOperation::Add(AddOperation {
            path,
            value: third(fields)?,
        })),
        OP_REPLACE => Ok(PatchOperation::Replace(ReplaceOperation {
            path,
            value: third(fields)?,
        })),
        OP_TEST => Ok(PatchOperation::Test(TestOperation {
            path,
            value: third(fields)?,
        })),
        OP_MOVE => Ok(PatchOperation::Move(MoveOperation {
            path,
            from: third_path(fields)?,
        })),
        OP_COPY => Ok(PatchOperation::Copy(CopyOperation {
            path,
            from: third_path(fields)?,
        })),
        other => Err(
            LiveDataError::new(ErrorCode::UnknownOpcode, "unrecognized patch opcode")
                .with_context("opcode", other),
        ),
    }
}

fn third(fields: &[Value]) -> Result<Value, LiveDataError> {
    fields.get(2).cloned().ok_or_else(|| truncated("missing value"))
}

fn third_path(fields: &[Value]) -> Result<PointerBuf, LiveDataError> {
    let raw = fields
        .get(2)
        .and_then(Value::as_str)
        .ok_or_else(|| truncated("missing from"))?;
    PointerBuf::parse(raw).map_err(|e| truncated("from").with_context("parse_error", e.to_string()))
}

fn truncated(what: &str) -> LiveDataError {
    LiveDataError::new(ErrorCode::TruncatedPatch, "compressed patch entry is incomplete")
        .with_context("missing", what)
}
