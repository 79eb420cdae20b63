use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredicateOpError {
    #[error("[Unsupported operation error] {0}")]
    UnsupportedOperation(String),
}

/**
 * Select の where 句で使われる比較演算子を表す
 * planner が predicate を (演算子, 比較値) の組に分解したうえでこの層に渡してくる
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl PredicateOp {
    /// planner から渡される演算子の記号を PredicateOp に変換する
    /// ここで扱えない演算子が渡された場合はエラーを返す (上流で処理されるべき predicate がこの層まで来ている)
    pub fn from_symbol(symbol: &str) -> Result<PredicateOp, PredicateOpError> {
        match symbol {
            "=" => Ok(PredicateOp::Eq),
            "!=" | "<>" => Ok(PredicateOp::Ne),
            "<" => Ok(PredicateOp::Lt),
            "<=" => Ok(PredicateOp::Le),
            ">" => Ok(PredicateOp::Gt),
            ">=" => Ok(PredicateOp::Ge),
            _ => Err(PredicateOpError::UnsupportedOperation(format!(
                "unknown predicate operator: {}",
                symbol
            ))),
        }
    }
}

impl fmt::Display for PredicateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            PredicateOp::Eq => "=",
            PredicateOp::Ne => "!=",
            PredicateOp::Lt => "<",
            PredicateOp::Le => "<=",
            PredicateOp::Gt => ">",
            PredicateOp::Ge => ">=",
        };
        write!(f, "{}", symbol)
    }
}

#[cfg(test)]
mod predicate_op_test {
    use super::*;

    #[test]
    fn test_from_symbol() {
        assert_eq!(PredicateOp::from_symbol("=").unwrap(), PredicateOp::Eq);
        assert_eq!(PredicateOp::from_symbol("!=").unwrap(), PredicateOp::Ne);
        assert_eq!(PredicateOp::from_symbol("<>").unwrap(), PredicateOp::Ne);
        assert_eq!(PredicateOp::from_symbol("<").unwrap(), PredicateOp::Lt);
        assert_eq!(PredicateOp::from_symbol("<=").unwrap(), PredicateOp::Le);
        assert_eq!(PredicateOp::from_symbol(">").unwrap(), PredicateOp::Gt);
        assert_eq!(PredicateOp::from_symbol(">=").unwrap(), PredicateOp::Ge);
    }

    #[test]
    fn test_from_symbol_unsupported() {
        for symbol in ["~", "==", "like", ""] {
            let result = PredicateOp::from_symbol(symbol);
            assert!(matches!(
                result,
                Err(PredicateOpError::UnsupportedOperation(_))
            ));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", PredicateOp::Le), "<=");
        assert_eq!(format!("{}", PredicateOp::Ne), "!=");
    }
}
