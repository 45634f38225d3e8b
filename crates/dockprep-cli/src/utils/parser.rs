use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid ring bond '{0}'. Expected two atom indices 'I,J' (e.g., '3,9').")]
    InvalidBond(String),

    #[error("Invalid glue coordinate '{0}'. Expected 'I=X,Y,Z' (e.g., '3=1.0,2.5,-0.4').")]
    InvalidGlue(String),

    #[error("Invalid flexible residue '{0}'. Expected 'RES:CHAIN:NUM' (e.g., 'LYS:A:42').")]
    InvalidFlexres(String),

    #[error("Component '{component}' cannot be empty in '{value}'.")]
    EmptyComponent {
        component: &'static str,
        value: String,
    },
}

/// Residue identity used when writing a flexible receptor residue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexresSpec {
    pub res: String,
    pub chain: String,
    pub num: i32,
}

pub fn parse_bond(value: &str) -> Result<(usize, usize), ParseError> {
    let invalid = || ParseError::InvalidBond(value.to_string());
    let (a, b) = value.split_once(',').ok_or_else(invalid)?;
    let a = a.trim().parse().map_err(|_| invalid())?;
    let b = b.trim().parse().map_err(|_| invalid())?;
    Ok((a, b))
}

/// Parses `I=X,Y,Z`. The coordinate count is checked later, against the ring
/// break it belongs to, so any number of values is accepted here.
pub fn parse_glue(value: &str) -> Result<(usize, Vec<f64>), ParseError> {
    let invalid = || ParseError::InvalidGlue(value.to_string());
    let (index, coords) = value.split_once('=').ok_or_else(invalid)?;
    let index = index.trim().parse().map_err(|_| invalid())?;
    let coords = coords
        .split(',')
        .map(|c| c.trim().parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((index, coords))
}

pub fn parse_flexres(value: &str) -> Result<FlexresSpec, ParseError> {
    let parts: Vec<&str> = value.split(':').collect();
    let [res, chain, num] = parts.as_slice() else {
        return Err(ParseError::InvalidFlexres(value.to_string()));
    };
    for (component, part) in [("res", res), ("chain", chain)] {
        if part.is_empty() {
            return Err(ParseError::EmptyComponent {
                component,
                value: value.to_string(),
            });
        }
    }
    let num = num
        .parse()
        .map_err(|_| ParseError::InvalidFlexres(value.to_string()))?;
    Ok(FlexresSpec {
        res: res.to_string(),
        chain: chain.to_string(),
        num,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ring_bonds() {
        assert_eq!(parse_bond("3,9"), Ok((3, 9)));
        assert_eq!(parse_bond(" 0 , 12 "), Ok((0, 12)));
        assert_eq!(
            parse_bond("3-9"),
            Err(ParseError::InvalidBond("3-9".to_string()))
        );
        assert!(parse_bond("a,1").is_err());
    }

    #[test]
    fn parses_glue_coordinates() {
        assert_eq!(
            parse_glue("4=1.0,2.5,-0.4"),
            Ok((4, vec![1.0, 2.5, -0.4]))
        );
        assert_eq!(parse_glue("4=1.0,2.0"), Ok((4, vec![1.0, 2.0])));
        assert!(parse_glue("4:1,2,3").is_err());
        assert!(parse_glue("4=1,x,3").is_err());
    }

    #[test]
    fn parses_flexres_specifiers() {
        assert_eq!(
            parse_flexres("LYS:A:42"),
            Ok(FlexresSpec {
                res: "LYS".to_string(),
                chain: "A".to_string(),
                num: 42
            })
        );
        assert_eq!(
            parse_flexres(":A:42"),
            Err(ParseError::EmptyComponent {
                component: "res",
                value: ":A:42".to_string()
            })
        );
        assert!(parse_flexres("LYS:A").is_err());
        assert!(parse_flexres("LYS:A:x").is_err());
    }
}
