use super::Pattern;
use super::query::{AtomExpr, BondExpr};
use crate::core::models::element::Element;
use crate::toolkit::ToolkitError;
use std::collections::BTreeMap;

const BOND_CHARS: &str = "-=#:~@!&,;/\\";

pub(super) struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(super) fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.trim().chars().collect(),
            pos: 0,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> ToolkitError {
        ToolkitError::InvalidSmarts {
            pattern: self.source.to_string(),
            position: self.pos,
            reason: reason.into(),
        }
    }

    fn unsupported(&self, feature: &str) -> ToolkitError {
        ToolkitError::UnsupportedSmarts {
            pattern: self.source.to_string(),
            feature: feature.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .parse()
            .ok()
    }

    fn small(&mut self, default: u8) -> Result<u8, ToolkitError> {
        match self.number() {
            None => Ok(default),
            Some(n) => u8::try_from(n).map_err(|_| self.invalid("count out of range")),
        }
    }

    pub(super) fn parse(mut self) -> Result<Pattern, ToolkitError> {
        if self.chars.is_empty() {
            return Err(self.invalid("empty pattern"));
        }
        let mut atoms: Vec<AtomExpr> = Vec::new();
        let mut bonds: Vec<(usize, usize, BondExpr)> = Vec::new();
        let mut prev: Option<usize> = None;
        let mut branches: Vec<Option<usize>> = Vec::new();
        let mut pending: Option<BondExpr> = None;
        let mut open_rings: BTreeMap<u32, (usize, Option<BondExpr>)> = BTreeMap::new();

        while let Some(c) = self.peek() {
            match c {
                '(' => {
                    self.bump();
                    if prev.is_none() {
                        return Err(self.invalid("branch before any atom"));
                    }
                    branches.push(prev);
                }
                ')' => {
                    self.bump();
                    prev = branches
                        .pop()
                        .ok_or_else(|| self.invalid("unmatched ')'"))?;
                }
                '.' => {
                    self.bump();
                    prev = None;
                }
                c if BOND_CHARS.contains(c) => {
                    pending = Some(self.parse_bond()?);
                }
                '%' | '0'..='9' => {
                    let digit = self.ring_digit()?;
                    let atom = prev.ok_or_else(|| self.invalid("ring closure before any atom"))?;
                    match open_rings.remove(&digit) {
                        Some((other, expr)) => {
                            let expr = pending
                                .take()
                                .or(expr)
                                .unwrap_or(BondExpr::SingleOrAromatic);
                            bonds.push((other, atom, expr));
                        }
                        None => {
                            open_rings.insert(digit, (atom, pending.take()));
                        }
                    }
                }
                _ => {
                    let expr = if c == '[' {
                        self.bump();
                        let expr = self.parse_low_and()?;
                        if self.bump() != Some(']') {
                            return Err(self.invalid("expected ']'"));
                        }
                        expr
                    } else {
                        self.parse_bare_atom()?
                    };
                    let index = atoms.len();
                    atoms.push(expr);
                    if let Some(p) = prev {
                        let bond = pending.take().unwrap_or(BondExpr::SingleOrAromatic);
                        bonds.push((p, index, bond));
                    } else if pending.is_some() {
                        return Err(self.invalid("bond without a preceding atom"));
                    }
                    prev = Some(index);
                }
            }
        }
        if let Some(digit) = open_rings.keys().next() {
            return Err(self.invalid(format!("ring {digit} is never closed")));
        }
        if !branches.is_empty() {
            return Err(self.invalid("unclosed branch"));
        }
        if pending.is_some() {
            return Err(self.invalid("dangling bond"));
        }
        Ok(Pattern::new(atoms, bonds))
    }

    fn ring_digit(&mut self) -> Result<u32, ToolkitError> {
        match self.bump() {
            Some('%') => {
                let hi = self.bump().and_then(|d| d.to_digit(10));
                let lo = self.bump().and_then(|d| d.to_digit(10));
                match (hi, lo) {
                    (Some(h), Some(l)) => Ok(h * 10 + l),
                    _ => Err(self.invalid("'%' must be followed by two digits")),
                }
            }
            Some(d) => d.to_digit(10).ok_or_else(|| self.invalid("expected ring digit")),
            None => Err(self.invalid("unexpected end")),
        }
    }

    fn parse_bare_atom(&mut self) -> Result<AtomExpr, ToolkitError> {
        let c = self.bump().ok_or_else(|| self.invalid("unexpected end"))?;
        let expr = match c {
            '*' => AtomExpr::True,
            'a' => AtomExpr::Aromatic,
            'A' => AtomExpr::Aliphatic,
            'C' if self.peek() == Some('l') => {
                self.bump();
                element(17, Some(false))
            }
            'B' if self.peek() == Some('r') => {
                self.bump();
                element(35, Some(false))
            }
            'B' => element(5, Some(false)),
            'C' => element(6, Some(false)),
            'N' => element(7, Some(false)),
            'O' => element(8, Some(false)),
            'P' => element(15, Some(false)),
            'S' => element(16, Some(false)),
            'F' => element(9, Some(false)),
            'I' => element(53, Some(false)),
            'b' => element(5, Some(true)),
            'c' => element(6, Some(true)),
            'n' => element(7, Some(true)),
            'o' => element(8, Some(true)),
            'p' => element(15, Some(true)),
            's' => element(16, Some(true)),
            _ => {
                self.pos -= 1;
                return Err(self.invalid(format!("unexpected character '{c}'")));
            }
        };
        Ok(expr)
    }

    fn parse_bond(&mut self) -> Result<BondExpr, ToolkitError> {
        self.parse_bond_low_and()
    }

    fn parse_bond_low_and(&mut self) -> Result<BondExpr, ToolkitError> {
        let mut parts = vec![self.parse_bond_or()?];
        while self.peek() == Some(';') {
            self.bump();
            parts.push(self.parse_bond_or()?);
        }
        Ok(collapse(parts, BondExpr::And))
    }

    fn parse_bond_or(&mut self) -> Result<BondExpr, ToolkitError> {
        let mut parts = vec![self.parse_bond_high_and()?];
        while self.peek() == Some(',') {
            self.bump();
            parts.push(self.parse_bond_high_and()?);
        }
        Ok(collapse(parts, BondExpr::Or))
    }

    fn parse_bond_high_and(&mut self) -> Result<BondExpr, ToolkitError> {
        let mut parts = vec![self.parse_bond_unary()?];
        loop {
            match self.peek() {
                Some('&') => {
                    self.bump();
                    parts.push(self.parse_bond_unary()?);
                }
                Some(c) if "-=#:~@!/\\".contains(c) => parts.push(self.parse_bond_unary()?),
                _ => break,
            }
        }
        Ok(collapse(parts, BondExpr::And))
    }

    fn parse_bond_unary(&mut self) -> Result<BondExpr, ToolkitError> {
        match self.bump() {
            Some('!') => Ok(BondExpr::Not(Box::new(self.parse_bond_unary()?))),
            Some('-') | Some('/') | Some('\\') => Ok(BondExpr::Single),
            Some('=') => Ok(BondExpr::Double),
            Some('#') => Ok(BondExpr::Triple),
            Some(':') => Ok(BondExpr::Aromatic),
            Some('~') => Ok(BondExpr::True),
            Some('@') => Ok(BondExpr::Ring),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.invalid("expected bond primitive"))
            }
        }
    }

    fn parse_low_and(&mut self) -> Result<AtomExpr, ToolkitError> {
        let mut parts = vec![self.parse_or()?];
        while self.peek() == Some(';') {
            self.bump();
            parts.push(self.parse_or()?);
        }
        Ok(collapse(parts, AtomExpr::And))
    }

    fn parse_or(&mut self) -> Result<AtomExpr, ToolkitError> {
        let mut parts = vec![self.parse_high_and()?];
        while self.peek() == Some(',') {
            self.bump();
            parts.push(self.parse_high_and()?);
        }
        Ok(collapse(parts, AtomExpr::Or))
    }

    fn parse_high_and(&mut self) -> Result<AtomExpr, ToolkitError> {
        let mut parts = vec![self.parse_unary()?];
        loop {
            match self.peek() {
                Some('&') => {
                    self.bump();
                    parts.push(self.parse_unary()?);
                }
                Some(';') | Some(',') | Some(']') | None => break,
                Some(_) => parts.push(self.parse_unary()?),
            }
        }
        Ok(collapse(parts, AtomExpr::And))
    }

    fn parse_unary(&mut self) -> Result<AtomExpr, ToolkitError> {
        if self.peek() == Some('!') {
            self.bump();
            return Ok(AtomExpr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primitive()
    }

    fn parse_primitive(&mut self) -> Result<AtomExpr, ToolkitError> {
        let at_bracket_start = self.pos > 0 && self.chars[self.pos - 1] == '[';
        let c = self
            .peek()
            .ok_or_else(|| self.invalid("unterminated bracket atom"))?;
        match c {
            '$' => return Err(self.unsupported("recursive SMARTS")),
            '@' => return Err(self.unsupported("chirality")),
            '0'..='9' => return Err(self.unsupported("isotope")),
            _ => {}
        }
        self.bump();
        let expr = match c {
            '*' => AtomExpr::True,
            '#' => {
                let n = self
                    .number()
                    .ok_or_else(|| self.invalid("'#' must be followed by an atomic number"))?;
                let n = u8::try_from(n).map_err(|_| self.invalid("atomic number out of range"))?;
                element(n, None)
            }
            '+' | '-' => {
                let sign: i8 = if c == '+' { 1 } else { -1 };
                let magnitude = match self.number() {
                    Some(n) => {
                        i8::try_from(n).map_err(|_| self.invalid("charge out of range"))?
                    }
                    None => {
                        let mut m = 1;
                        while self.peek() == Some(c) {
                            self.bump();
                            m += 1;
                        }
                        m
                    }
                };
                AtomExpr::Charge(sign * magnitude)
            }
            ':' => {
                self.number();
                AtomExpr::True
            }
            'H' if at_bracket_start
                && matches!(self.peek(), Some(']') | Some('+') | Some('-')) =>
            {
                element(1, None)
            }
            'H' => AtomExpr::TotalHCount(self.small(1)?),
            'h' => AtomExpr::ImplicitHCount(self.small(1)?),
            'D' => AtomExpr::Degree(self.small(1)?),
            'X' => AtomExpr::Connectivity(self.small(1)?),
            'v' => AtomExpr::Valence(self.small(1)?),
            'x' => match self.number() {
                Some(n) => AtomExpr::RingBondCount(
                    u8::try_from(n).map_err(|_| self.invalid("count out of range"))?,
                ),
                None => AtomExpr::InRing,
            },
            'R' | 'r' => match self.number() {
                Some(0) => AtomExpr::Not(Box::new(AtomExpr::InRing)),
                Some(n) => {
                    let n = u8::try_from(n).map_err(|_| self.invalid("count out of range"))?;
                    if c == 'R' {
                        AtomExpr::RingMembership(n)
                    } else {
                        AtomExpr::SmallestRingSize(n)
                    }
                }
                None => AtomExpr::InRing,
            },
            'a' => AtomExpr::Aromatic,
            'A' if self.peek().is_none_or(|n| !n.is_ascii_lowercase())
                || !is_element(&format!("A{}", self.peek().unwrap_or(' '))) =>
            {
                AtomExpr::Aliphatic
            }
            c if c.is_ascii_lowercase() => {
                let two: String = [c, self.peek().unwrap_or(' ')].iter().collect();
                if matches!(two.as_str(), "se" | "as") {
                    self.bump();
                    element(symbol_number(&two)?, Some(true))
                } else if matches!(c, 'b' | 'c' | 'n' | 'o' | 'p' | 's') {
                    element(symbol_number(&c.to_string())?, Some(true))
                } else {
                    self.pos -= 1;
                    return Err(self.invalid(format!("unknown primitive '{c}'")));
                }
            }
            c if c.is_ascii_uppercase() => {
                let next = self.peek().filter(|n| n.is_ascii_lowercase());
                match next {
                    Some(n) if is_element(&format!("{c}{n}")) => {
                        self.bump();
                        element(symbol_number(&format!("{c}{n}"))?, Some(false))
                    }
                    _ if is_element(&c.to_string()) => {
                        element(symbol_number(&c.to_string())?, Some(false))
                    }
                    _ => {
                        self.pos -= 1;
                        return Err(self.invalid(format!("unknown primitive '{c}'")));
                    }
                }
            }
            _ => {
                self.pos -= 1;
                return Err(self.invalid(format!("unexpected character '{c}'")));
            }
        };
        Ok(expr)
    }
}

fn element(atomic_num: u8, aromatic: Option<bool>) -> AtomExpr {
    AtomExpr::Element {
        atomic_num,
        aromatic,
    }
}

fn is_element(symbol: &str) -> bool {
    symbol.parse::<Element>().is_ok() && !matches!(symbol, "D" | "T")
}

fn symbol_number(symbol: &str) -> Result<u8, ToolkitError> {
    symbol
        .parse::<Element>()
        .map(|e| e.atomic_number())
        .map_err(|e| ToolkitError::InvalidSmarts {
            pattern: symbol.to_string(),
            position: 0,
            reason: e.to_string(),
        })
}

fn collapse<T>(mut parts: Vec<T>, combine: fn(Vec<T>) -> T) -> T {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        combine(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom_exprs(pattern: &str) -> Vec<AtomExpr> {
        Parser::new(pattern).parse().unwrap().atoms().cloned().collect()
    }

    #[test]
    fn parses_bare_atoms_and_default_bonds() {
        let p = Parser::new("CCl").parse().unwrap();
        assert_eq!(
            p.atoms().cloned().collect::<Vec<_>>(),
            vec![element(6, Some(false)), element(17, Some(false))]
        );
        assert_eq!(p.bonds().next().unwrap().2, &BondExpr::SingleOrAromatic);
    }

    #[test]
    fn bracket_precedence_binds_and_over_or_over_semicolon() {
        let exprs = atom_exprs("[C,N;X3]");
        assert_eq!(
            exprs[0],
            AtomExpr::And(vec![
                AtomExpr::Or(vec![element(6, Some(false)), element(7, Some(false))]),
                AtomExpr::Connectivity(3),
            ])
        );
        let exprs = atom_exprs("[#7X3v3]");
        assert_eq!(
            exprs[0],
            AtomExpr::And(vec![
                element(7, None),
                AtomExpr::Connectivity(3),
                AtomExpr::Valence(3),
            ])
        );
    }

    #[test]
    fn hydrogen_atom_versus_hydrogen_count() {
        assert_eq!(atom_exprs("[H]")[0], element(1, None));
        assert_eq!(
            atom_exprs("[NH2]")[0],
            AtomExpr::And(vec![element(7, Some(false)), AtomExpr::TotalHCount(2)])
        );
    }

    #[test]
    fn charges_and_negation() {
        assert_eq!(
            atom_exprs("[#7+1]")[0],
            AtomExpr::And(vec![element(7, None), AtomExpr::Charge(1)])
        );
        assert_eq!(
            atom_exprs("[O--]")[0],
            AtomExpr::And(vec![element(8, Some(false)), AtomExpr::Charge(-2)])
        );
        assert_eq!(
            atom_exprs("[!#1]")[0],
            AtomExpr::Not(Box::new(element(1, None)))
        );
        assert_eq!(
            atom_exprs("[CR0]")[0],
            AtomExpr::And(vec![
                element(6, Some(false)),
                AtomExpr::Not(Box::new(AtomExpr::InRing))
            ])
        );
    }

    #[test]
    fn bond_expressions() {
        let p = Parser::new("[*]!@-[*]").parse().unwrap();
        assert_eq!(
            p.bonds().next().unwrap().2,
            &BondExpr::And(vec![
                BondExpr::Not(Box::new(BondExpr::Ring)),
                BondExpr::Single
            ])
        );
        let p = Parser::new("C=,#N").parse().unwrap();
        assert_eq!(
            p.bonds().next().unwrap().2,
            &BondExpr::Or(vec![BondExpr::Double, BondExpr::Triple])
        );
    }

    #[test]
    fn ring_closures_and_branches() {
        let p = Parser::new("C1CC(O)C1").parse().unwrap();
        assert_eq!(p.atoms().len(), 5);
        let pairs: Vec<(usize, usize)> = p.bonds().map(|(a, b, _)| (a, b)).collect();
        assert_eq!(pairs, vec![(0, 1), (1, 2), (2, 3), (2, 4), (0, 4)]);
    }

    #[test]
    fn unsupported_features_are_reported() {
        for pattern in ["[$(CO)]", "[C@H]", "[13C]"] {
            assert!(matches!(
                Parser::new(pattern).parse(),
                Err(ToolkitError::UnsupportedSmarts { .. })
            ));
        }
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        for pattern in ["", "C(", "C)", "C1CC", "[C", "[Q]", "C-", "Cx"] {
            assert!(
                matches!(
                    Parser::new(pattern).parse(),
                    Err(ToolkitError::InvalidSmarts { .. })
                ),
                "{pattern} should be invalid"
            );
        }
    }
}
