//! ABI encoding of resolved parameters against runtime-loaded interfaces

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier},
    json_abi::{Function, JsonAbi, Param as AbiParam},
};
use alloy_primitives::{Address, Bytes};
use release_common::types::{FunctionInput, TargetFunction};

use crate::{errors::ReleaseError, params::ResolvedParam};

/// Encode constructor arguments, without a selector
pub fn encode_constructor_args(
    abi: &JsonAbi,
    args: &[ResolvedParam],
) -> Result<Bytes, ReleaseError> {
    let Some(constructor) = abi.constructor() else {
        if args.is_empty() {
            return Ok(Bytes::new());
        }
        return Err(ReleaseError::Encoding(format!(
            "{} constructor arguments given but the contract has no constructor",
            args.len()
        )));
    };

    let values = to_sol_values(&constructor.inputs, args)?;
    constructor
        .abi_encode_input(&values)
        .map(Bytes::from)
        .map_err(|e| ReleaseError::Encoding(format!("constructor: {e}")))
}

/// Encode a call of `function`, including its selector
pub fn encode_function_call(
    function: &Function,
    args: &[ResolvedParam],
) -> Result<Bytes, ReleaseError> {
    let values = to_sol_values(&function.inputs, args)?;
    function
        .abi_encode_input(&values)
        .map(Bytes::from)
        .map_err(|e| ReleaseError::Encoding(format!("{}: {e}", function.signature())))
}

/// Encode the constructor arguments of an ERC-1967 proxy:
/// `(address implementation, bytes data)`
pub fn encode_proxy_args(implementation: Address, init_calldata: Bytes) -> Bytes {
    DynSolValue::Tuple(vec![
        DynSolValue::Address(implementation),
        DynSolValue::Bytes(init_calldata.to_vec()),
    ])
    .abi_encode_params()
    .into()
}

/// Describe a function as a proposal step target
pub fn target_function(function: &Function) -> TargetFunction {
    TargetFunction {
        name: function.name.clone(),
        inputs: function.inputs.iter().map(function_input).collect(),
    }
}

/// Describe an ABI parameter as a proposal step input
fn function_input(param: &AbiParam) -> FunctionInput {
    FunctionInput {
        ty: param.ty.clone(),
        name: param.name.clone(),
        components: param.components.iter().map(function_input).collect(),
    }
}

/// Convert resolved arguments into Solidity values of the given parameter types
fn to_sol_values(
    params: &[AbiParam],
    args: &[ResolvedParam],
) -> Result<Vec<DynSolValue>, ReleaseError> {
    if params.len() != args.len() {
        return Err(ReleaseError::Encoding(format!(
            "expected {} arguments, got {}",
            params.len(),
            args.len()
        )));
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = param
                .resolve()
                .map_err(|e| ReleaseError::Encoding(format!("type of {}: {e}", param.name)))?;
            to_sol_value(arg, &ty)
        })
        .collect()
}

/// Convert a resolved argument into a Solidity value of type `ty`
pub fn to_sol_value(arg: &ResolvedParam, ty: &DynSolType) -> Result<DynSolValue, ReleaseError> {
    match (arg, ty) {
        (ResolvedParam::List(items), DynSolType::Array(inner)) => items
            .iter()
            .map(|item| to_sol_value(item, inner))
            .collect::<Result<_, _>>()
            .map(DynSolValue::Array),
        (ResolvedParam::List(items), DynSolType::FixedArray(inner, len)) => {
            check_len(items, *len, ty)?;
            items
                .iter()
                .map(|item| to_sol_value(item, inner))
                .collect::<Result<_, _>>()
                .map(DynSolValue::FixedArray)
        }
        (ResolvedParam::List(items), DynSolType::Tuple(types)) => {
            check_len(items, types.len(), ty)?;
            items
                .iter()
                .zip(types)
                .map(|(item, ty)| to_sol_value(item, ty))
                .collect::<Result<_, _>>()
                .map(DynSolValue::Tuple)
        }
        (ResolvedParam::List(_), _) => Err(ReleaseError::Encoding(format!(
            "list argument given for non-list type {ty}"
        ))),
        (ResolvedParam::Bool(b), DynSolType::Bool) => Ok(DynSolValue::Bool(*b)),
        (ResolvedParam::Address(a), DynSolType::Address) => Ok(DynSolValue::Address(*a)),
        (ResolvedParam::Role(r), DynSolType::FixedBytes(32)) => {
            Ok(DynSolValue::FixedBytes(*r, 32))
        }
        (ResolvedParam::String(s), _) => coerce(s, ty),
        (ResolvedParam::Bool(b), _) => coerce(&b.to_string(), ty),
        (ResolvedParam::Address(a), _) => coerce(&a.to_string(), ty),
        (ResolvedParam::Role(r), _) => coerce(&r.to_string(), ty),
    }
}

/// Parse a string into a Solidity value of type `ty`
fn coerce(s: &str, ty: &DynSolType) -> Result<DynSolValue, ReleaseError> {
    ty.coerce_str(s)
        .map_err(|e| ReleaseError::Encoding(format!("{s:?} as {ty}: {e}")))
}

/// Check that a list argument has the length its type requires
fn check_len(items: &[ResolvedParam], len: usize, ty: &DynSolType) -> Result<(), ReleaseError> {
    if items.len() != len {
        return Err(ReleaseError::Encoding(format!(
            "{ty} expects {len} elements, got {}",
            items.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy::dyn_abi::{DynSolType, DynSolValue};
    use alloy_primitives::{Address, U256};

    use super::to_sol_value;
    use crate::params::ResolvedParam;

    #[test]
    fn test_tuple_coercion() {
        let ty = DynSolType::Tuple(vec![DynSolType::Address, DynSolType::Uint(256)]);
        let arg = ResolvedParam::List(vec![
            ResolvedParam::Address(Address::with_last_byte(1)),
            ResolvedParam::String("1000".to_string()),
        ]);

        let value = to_sol_value(&arg, &ty).unwrap();
        assert_eq!(
            value,
            DynSolValue::Tuple(vec![
                DynSolValue::Address(Address::with_last_byte(1)),
                DynSolValue::Uint(U256::from(1000), 256),
            ])
        );
    }

    #[test]
    fn test_tuple_arity_checked() {
        let ty = DynSolType::Tuple(vec![DynSolType::Address, DynSolType::Uint(256)]);
        let arg = ResolvedParam::List(vec![ResolvedParam::String("1".to_string())]);

        assert!(to_sol_value(&arg, &ty).is_err());
    }
}
