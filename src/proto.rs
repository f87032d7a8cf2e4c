//! Messages and method names of the calculator service.

use calc_rpc_stream::proto::CallShape;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalcMethod {
    Sum,
    PrimeNumbers,
    ComputeAverage,
    FindMaxNumber,
}

impl CalcMethod {
    pub const ALL: [CalcMethod; 4] =
        [Self::Sum, Self::PrimeNumbers, Self::ComputeAverage, Self::FindMaxNumber];

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sum => "CalculatorService/Sum",
            Self::PrimeNumbers => "CalculatorService/PrimeNumbers",
            Self::ComputeAverage => "CalculatorService/ComputeAverage",
            Self::FindMaxNumber => "CalculatorService/FindMaxNumber",
        }
    }

    #[inline]
    pub fn shape(&self) -> CallShape {
        match self {
            Self::Sum => CallShape::Unary,
            Self::PrimeNumbers => CallShape::ServerStream,
            Self::ComputeAverage => CallShape::ClientStream,
            Self::FindMaxNumber => CallShape::BidiStream,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SumReq {
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SumResp {
    pub sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimeNumbersReq {
    pub limit: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimeNumbersResp {
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeAverageReq {
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeAverageResp {
    pub average: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindMaxNumberReq {
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindMaxNumberResp {
    pub value: i64,
}
