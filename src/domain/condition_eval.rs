//! Condition evaluation engine.
//!
//! Evaluates parsed conditions against a bar series.
//!
//! # Evaluation Semantics
//!
//! - Column names are resolved against the whole series first: a column no
//!   bar carries is an error, a value missing on a single bar is NaN.
//! - Numeric comparisons follow IEEE semantics, so anything compared with
//!   NaN is false except `!=`.
//! - Booleans take part in arithmetic and comparisons as 1/0.
//! - `and`/`or` short-circuit and require boolean operands.
//! - Cross columns (`macd_bullish_cross`, ...) compare the current and
//!   previous bar and are false at index 0.

use crate::domain::bar::{Bar, Column};
use crate::domain::condition::{ArithOp, CompareOp, Expr};
use crate::domain::error::EvalError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
}

impl Value {
    fn as_number(self) -> f64 {
        match self {
            Value::Number(v) => v,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
        }
    }

    fn as_bool(self, context: &str) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(b),
            Value::Number(_) => Err(EvalError::TypeMismatch(format!(
                "{} requires boolean operands",
                context
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Number,
    Bool,
}

/// Static type of an expression. Logic operators need boolean operands and
/// negation needs a number; everything else accepts both.
pub fn type_of(expr: &Expr) -> Result<ValueType, EvalError> {
    match expr {
        Expr::Number(_) => Ok(ValueType::Number),
        Expr::Bool(_) => Ok(ValueType::Bool),
        Expr::Column(c) if c.cross_inputs().is_some() => Ok(ValueType::Bool),
        Expr::Column(_) => Ok(ValueType::Number),
        Expr::Neg(inner) => {
            type_of(inner)?;
            Ok(ValueType::Number)
        }
        Expr::Arith { left, right, .. } => {
            type_of(left)?;
            type_of(right)?;
            Ok(ValueType::Number)
        }
        Expr::Compare { left, right, .. } => {
            type_of(left)?;
            type_of(right)?;
            Ok(ValueType::Bool)
        }
        Expr::And(items) | Expr::Or(items) => {
            for item in items {
                if type_of(item)? != ValueType::Bool {
                    return Err(EvalError::TypeMismatch(format!(
                        "'{}' is not a boolean expression",
                        item
                    )));
                }
            }
            Ok(ValueType::Bool)
        }
        Expr::Not(inner) => {
            if type_of(inner)? != ValueType::Bool {
                return Err(EvalError::TypeMismatch(format!(
                    "'{}' is not a boolean expression",
                    inner
                )));
            }
            Ok(ValueType::Bool)
        }
    }
}

/// Verify that `expr` is a boolean condition whose columns all exist in `bars`.
pub fn check(expr: &Expr, bars: &[Bar]) -> Result<(), EvalError> {
    if type_of(expr)? != ValueType::Bool {
        return Err(EvalError::TypeMismatch(format!(
            "condition '{}' does not evaluate to a boolean",
            expr
        )));
    }
    for column in expr.columns() {
        if !column.present_in(bars) {
            return Err(EvalError::MissingColumn(column.name().to_string()));
        }
    }
    Ok(())
}

/// Evaluate the condition on every bar, oldest first.
pub fn evaluate_series(expr: &Expr, bars: &[Bar]) -> Result<Vec<bool>, EvalError> {
    if bars.is_empty() {
        return Ok(Vec::new());
    }
    check(expr, bars)?;
    (0..bars.len())
        .map(|i| evaluate_at(expr, bars, i))
        .collect()
}

/// Evaluate the condition on the most recent bar, using earlier bars for
/// cross context. Returns `Ok(false)` for an empty series.
pub fn evaluate_latest(expr: &Expr, bars: &[Bar]) -> Result<bool, EvalError> {
    if bars.is_empty() {
        return Ok(false);
    }
    check(expr, bars)?;
    evaluate_at(expr, bars, bars.len() - 1)
}

pub fn evaluate_at(expr: &Expr, bars: &[Bar], bar_index: usize) -> Result<bool, EvalError> {
    if bar_index >= bars.len() {
        return Err(EvalError::IndexOutOfRange {
            index: bar_index,
            len: bars.len(),
        });
    }
    eval(expr, bars, bar_index)?.as_bool("condition")
}

fn eval(expr: &Expr, bars: &[Bar], bar_index: usize) -> Result<Value, EvalError> {
    match expr {
        Expr::Number(v) => Ok(Value::Number(*v)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Column(column) => Ok(resolve_column(column, bars, bar_index)),
        Expr::Neg(inner) => Ok(Value::Number(-eval(inner, bars, bar_index)?.as_number())),
        Expr::Arith { op, left, right } => {
            let l = eval(left, bars, bar_index)?.as_number();
            let r = eval(right, bars, bar_index)?.as_number();
            Ok(Value::Number(match op {
                ArithOp::Add => l + r,
                ArithOp::Sub => l - r,
                ArithOp::Mul => l * r,
                ArithOp::Div => l / r,
            }))
        }
        Expr::Compare { op, left, right } => {
            let l = eval(left, bars, bar_index)?.as_number();
            let r = eval(right, bars, bar_index)?.as_number();
            Ok(Value::Bool(compare(*op, l, r)))
        }
        Expr::And(items) => {
            for item in items {
                if !eval(item, bars, bar_index)?.as_bool("and")? {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        Expr::Or(items) => {
            for item in items {
                if eval(item, bars, bar_index)?.as_bool("or")? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        Expr::Not(inner) => Ok(Value::Bool(!eval(inner, bars, bar_index)?.as_bool("not")?)),
    }
}

fn compare(op: CompareOp, l: f64, r: f64) -> bool {
    match op {
        CompareOp::Lt => l < r,
        CompareOp::Le => l <= r,
        CompareOp::Gt => l > r,
        CompareOp::Ge => l >= r,
        CompareOp::Eq => l == r,
        CompareOp::Ne => l != r,
    }
}

fn resolve_column(column: &Column, bars: &[Bar], bar_index: usize) -> Value {
    match column.cross_inputs() {
        Some((fast, slow, above)) => Value::Bool(crossed(&fast, &slow, above, bars, bar_index)),
        None => Value::Number(bars[bar_index].value(column).unwrap_or(f64::NAN)),
    }
}

fn crossed(fast: &Column, slow: &Column, above: bool, bars: &[Bar], bar_index: usize) -> bool {
    if bar_index == 0 {
        return false;
    }
    let curr = &bars[bar_index];
    let prev = &bars[bar_index - 1];
    let (Some(f), Some(s), Some(pf), Some(ps)) = (
        curr.value(fast),
        curr.value(slow),
        prev.value(fast),
        prev.value(slow),
    ) else {
        return false;
    };
    if above {
        f > s && pf <= ps
    } else {
        f < s && pf >= ps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::condition_parser::parse;
    use chrono::NaiveDate;

    fn make_bar(day: u32, close: f64) -> Bar {
        let ts = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Bar::new(ts, close, close + 1.0, close - 1.0, close, 1000.0)
    }

    fn with_rsi(mut bar: Bar, rsi: Option<f64>) -> Bar {
        bar.indicators.rsi = rsi;
        bar
    }

    fn eval_str(cond: &str, bars: &[Bar], i: usize) -> bool {
        evaluate_at(&parse(cond).unwrap(), bars, i).unwrap()
    }

    #[test]
    fn evaluate_close_gt_constant() {
        let bars = vec![make_bar(1, 105.0)];
        assert!(eval_str("close > 100", &bars, 0));
        assert!(!eval_str("close < 100", &bars, 0));
    }

    #[test]
    fn evaluate_and_or_not() {
        let bars = vec![with_rsi(make_bar(1, 105.0), Some(25.0))];
        assert!(eval_str("rsi < 30 and close > 100", &bars, 0));
        assert!(!eval_str("rsi < 30 and close > 200", &bars, 0));
        assert!(eval_str("rsi > 70 or close > 100", &bars, 0));
        assert!(eval_str("not rsi > 70", &bars, 0));
    }

    #[test]
    fn evaluate_arithmetic() {
        let mut bar = make_bar(1, 105.0);
        bar.indicators.volume_sma = Some(600.0);
        let bars = vec![bar];
        assert!(eval_str("volume > volume_sma * 1.5", &bars, 0));
        assert!(!eval_str("volume > volume_sma * 2", &bars, 0));
        assert!(eval_str("(high - low) / close < 0.02", &bars, 0));
    }

    #[test]
    fn evaluate_chained_comparison() {
        let bars = vec![with_rsi(make_bar(1, 100.0), Some(50.0))];
        assert!(eval_str("30 < rsi < 70", &bars, 0));
        assert!(!eval_str("60 < rsi < 70", &bars, 0));
    }

    #[test]
    fn nan_comparisons_are_false_except_not_equal() {
        let bars = vec![
            with_rsi(make_bar(1, 100.0), None),
            with_rsi(make_bar(2, 100.0), Some(20.0)),
        ];
        assert!(!eval_str("rsi < 30", &bars, 0));
        assert!(!eval_str("rsi >= 30", &bars, 0));
        assert!(!eval_str("rsi == 30", &bars, 0));
        assert!(eval_str("rsi != 30", &bars, 0));
        assert!(eval_str("rsi < 30", &bars, 1));
    }

    #[test]
    fn macd_bullish_cross_detects_crossing() {
        let mut bars = vec![make_bar(1, 100.0), make_bar(2, 100.0), make_bar(3, 100.0)];
        bars[0].indicators.macd = Some(-1.0);
        bars[0].indicators.macd_signal = Some(0.0);
        bars[1].indicators.macd = Some(1.0);
        bars[1].indicators.macd_signal = Some(0.0);
        bars[2].indicators.macd = Some(2.0);
        bars[2].indicators.macd_signal = Some(0.0);
        assert!(!eval_str("macd_bullish_cross", &bars, 0));
        assert!(eval_str("macd_bullish_cross", &bars, 1));
        assert!(!eval_str("macd_bullish_cross", &bars, 2));
        assert!(eval_str("macd_bullish_cross == True", &bars, 1));
        assert!(!eval_str("macd_bearish_cross", &bars, 1));
    }

    #[test]
    fn stoch_rsi_bearish_cross() {
        let mut bars = vec![make_bar(1, 100.0), make_bar(2, 100.0)];
        bars[0].indicators.stoch_rsi_k = Some(80.0);
        bars[0].indicators.stoch_rsi_d = Some(75.0);
        bars[1].indicators.stoch_rsi_k = Some(70.0);
        bars[1].indicators.stoch_rsi_d = Some(74.0);
        assert!(eval_str("stoch_rsi_bearish", &bars, 1));
        assert!(!eval_str("stoch_rsi_bullish", &bars, 1));
    }

    #[test]
    fn evaluate_series_marks_every_bar() {
        let bars: Vec<Bar> = [90.0, 110.0, 95.0, 120.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| make_bar(i as u32 + 1, c))
            .collect();
        let mask = evaluate_series(&parse("close > 100").unwrap(), &bars).unwrap();
        assert_eq!(mask, vec![false, true, false, true]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let bars = vec![make_bar(1, 100.0)];
        let err = evaluate_series(&parse("rsi < 30").unwrap(), &bars).unwrap_err();
        assert_eq!(err, EvalError::MissingColumn("rsi".into()));
        let err = evaluate_latest(&parse("gold_close > 1").unwrap(), &bars).unwrap_err();
        assert_eq!(err, EvalError::MissingColumn("gold_close".into()));
    }

    #[test]
    fn extra_columns_resolve() {
        let mut bar = make_bar(1, 100.0);
        bar.extra.insert("gold_close".into(), 2050.0);
        let bars = vec![bar];
        assert!(evaluate_latest(&parse("gold_close > 2000").unwrap(), &bars).unwrap());
    }

    #[test]
    fn non_boolean_condition_is_a_type_error() {
        let bars = vec![make_bar(1, 100.0)];
        let err = evaluate_series(&parse("close + 1").unwrap(), &bars).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch(_)));
        let err = evaluate_series(&parse("close and open").unwrap(), &bars).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch(_)));
    }

    #[test]
    fn empty_series_is_not_an_error() {
        assert_eq!(
            evaluate_series(&parse("rsi < 30").unwrap(), &[]).unwrap(),
            Vec::<bool>::new()
        );
        assert!(!evaluate_latest(&parse("rsi < 30").unwrap(), &[]).unwrap());
    }

    #[test]
    fn out_of_range_index() {
        let bars = vec![make_bar(1, 100.0)];
        let err = evaluate_at(&parse("close > 1").unwrap(), &bars, 3).unwrap_err();
        assert_eq!(err, EvalError::IndexOutOfRange { index: 3, len: 1 });
    }

    #[test]
    fn type_of_reports_shapes() {
        assert_eq!(type_of(&parse("close * 2").unwrap()).unwrap(), ValueType::Number);
        assert_eq!(type_of(&parse("close > 2").unwrap()).unwrap(), ValueType::Bool);
        assert_eq!(
            type_of(&parse("stoch_rsi_bullish").unwrap()).unwrap(),
            ValueType::Bool
        );
        assert!(type_of(&parse("not close").unwrap()).is_err());
    }
}
