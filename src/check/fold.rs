use crate::data::ast::BinOp;
use crate::data::ast::Lit;
use crate::data::ast::UnOp;
use crate::data::ids::StringId;
use crate::data::symbol;
use crate::data::symbol::Symbol;
use crate::Map;

/// Pool of compile-time-constant strings. Every string literal and
/// every folded concatenation is interned here; equal strings share a
/// `StringId`, and the assembly writer emits one backing object per
/// id.
#[derive(Debug, Default)]
pub struct ConstStringMap {
    ids: Map<Symbol, StringId>,
}

impl ConstStringMap {
    pub fn intern(&mut self, string: Symbol) -> StringId {
        let next = StringId(self.ids.len() as u64);
        *self.ids.entry(string).or_insert(next)
    }

    pub fn get(&self, string: Symbol) -> Option<StringId> {
        self.ids.get(&string).copied()
    }

    /// Pool entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, StringId)> + '_ {
        self.ids.iter().map(|(symbol, sid)| (*symbol, *sid))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Renders a constant operand the way `String.valueOf` would at
/// runtime, for folding string concatenations.
fn stringify(lit: &Lit) -> Option<String> {
    match lit {
        Lit::Int(value) => Some(value.to_string()),
        Lit::Bool(value) => Some(value.to_string()),
        Lit::Char(value) => char::from_u32(*value as u32).map(String::from),
        Lit::String(symbol, _) => Some(symbol.as_str().to_string()),
        Lit::Null => Some("null".to_string()),
    }
}

fn numeric(lit: &Lit) -> Option<i32> {
    match lit {
        Lit::Int(value) => Some(*value),
        Lit::Char(value) => Some(*value as i32),
        _ => None,
    }
}

/// Folds a binary operation over two constants. Division and modulo
/// by zero are left unfolded so they raise at runtime.
pub fn fold_binary(
    op: BinOp,
    lhs: &Lit,
    rhs: &Lit,
    strings: &mut ConstStringMap,
) -> Option<Lit> {
    // String concatenation folds when either side is a constant
    // string and the other is any constant.
    if op == BinOp::Add {
        if let (Lit::String(_, _), _) | (_, Lit::String(_, _)) = (lhs, rhs) {
            let folded = format!("{}{}", stringify(lhs)?, stringify(rhs)?);
            let symbol = symbol::intern(folded);
            let sid = strings.intern(symbol);
            return Some(Lit::String(symbol, sid));
        }
    }

    if let (Some(lhs), Some(rhs)) = (numeric(lhs), numeric(rhs)) {
        return match op {
            BinOp::Add => Some(Lit::Int(lhs.wrapping_add(rhs))),
            BinOp::Sub => Some(Lit::Int(lhs.wrapping_sub(rhs))),
            BinOp::Mul => Some(Lit::Int(lhs.wrapping_mul(rhs))),
            BinOp::Div if rhs != 0 => Some(Lit::Int(lhs.wrapping_div(rhs))),
            BinOp::Mod if rhs != 0 => Some(Lit::Int(lhs.wrapping_rem(rhs))),
            BinOp::Div | BinOp::Mod => None,
            BinOp::Eq => Some(Lit::Bool(lhs == rhs)),
            BinOp::Ne => Some(Lit::Bool(lhs != rhs)),
            BinOp::Lt => Some(Lit::Bool(lhs < rhs)),
            BinOp::Gt => Some(Lit::Bool(lhs > rhs)),
            BinOp::Le => Some(Lit::Bool(lhs <= rhs)),
            BinOp::Ge => Some(Lit::Bool(lhs >= rhs)),
            _ => None,
        };
    }

    if let (Lit::Bool(lhs), Lit::Bool(rhs)) = (lhs, rhs) {
        return match op {
            BinOp::LAnd | BinOp::And => Some(Lit::Bool(*lhs && *rhs)),
            BinOp::LOr | BinOp::Or => Some(Lit::Bool(*lhs || *rhs)),
            BinOp::Xor => Some(Lit::Bool(lhs != rhs)),
            BinOp::Eq => Some(Lit::Bool(lhs == rhs)),
            BinOp::Ne => Some(Lit::Bool(lhs != rhs)),
            _ => None,
        };
    }

    None
}

pub fn fold_unary(op: UnOp, lit: &Lit) -> Option<Lit> {
    match (op, lit) {
        (UnOp::Neg, lit) => numeric(lit).map(|value| Lit::Int(value.wrapping_neg())),
        (UnOp::Not, Lit::Bool(value)) => Some(Lit::Bool(!value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_arithmetic() {
        let mut strings = ConstStringMap::default();
        assert_eq!(
            fold_binary(BinOp::Add, &Lit::Int(1), &Lit::Int(2), &mut strings),
            Some(Lit::Int(3)),
        );
        assert_eq!(
            fold_binary(BinOp::Mul, &Lit::Int(i32::MAX), &Lit::Int(2), &mut strings),
            Some(Lit::Int(-2)),
        );
    }

    #[test]
    fn division_by_zero_stays() {
        let mut strings = ConstStringMap::default();
        assert_eq!(
            fold_binary(BinOp::Div, &Lit::Int(1), &Lit::Int(0), &mut strings),
            None,
        );
    }

    #[test]
    fn string_concat_shares_ids() {
        let mut strings = ConstStringMap::default();
        let a = Lit::String(symbol::intern("a"), strings.intern(symbol::intern("a")));
        let b = Lit::String(symbol::intern("b"), strings.intern(symbol::intern("b")));
        let folded = fold_binary(BinOp::Add, &a, &b, &mut strings).unwrap();
        let direct = strings.intern(symbol::intern("ab"));
        match folded {
            Lit::String(symbol, sid) => {
                assert_eq!(symbol.as_str(), "ab");
                assert_eq!(sid, direct);
            }
            lit => panic!("expected string, found {:?}", lit),
        }
    }

    #[test]
    fn string_concat_with_primitives() {
        let mut strings = ConstStringMap::default();
        let s = Lit::String(symbol::intern("n = "), strings.intern(symbol::intern("n = ")));
        let folded = fold_binary(BinOp::Add, &s, &Lit::Int(42), &mut strings).unwrap();
        match folded {
            Lit::String(symbol, _) => assert_eq!(symbol.as_str(), "n = 42"),
            lit => panic!("expected string, found {:?}", lit),
        }
    }

    #[test]
    fn boolean_folding() {
        let mut strings = ConstStringMap::default();
        assert_eq!(
            fold_binary(BinOp::LAnd, &Lit::Bool(true), &Lit::Bool(false), &mut strings),
            Some(Lit::Bool(false)),
        );
        assert_eq!(fold_unary(UnOp::Not, &Lit::Bool(false)), Some(Lit::Bool(true)));
    }
}
