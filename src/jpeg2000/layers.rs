//! Quality layer formation for post-compression rate allocation.
//!
//! A [`LayerPlan`] is a list of optimization points, each a target bitrate
//! (bits per pixel) optionally followed by extra layers that are not
//! optimized. The overall target bitrate always closes the list as an
//! implicit last point.

use log::{trace, warn};

use crate::error::{J2kError, J2kResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerPoint {
    pub target_bitrate: f32,
    pub extra_layers: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerPlan {
    overall_bitrate: f32,
    points: Vec<LayerPoint>,
    total_layers: u32,
}

impl LayerPlan {
    pub fn new(overall_bitrate: f32) -> J2kResult<Self> {
        if !(overall_bitrate > 0.0) {
            return Err(J2kError::config(format!(
                "overall target bitrate must be positive, got {overall_bitrate}"
            )));
        }
        Ok(Self {
            overall_bitrate,
            points: Vec::new(),
            total_layers: 1,
        })
    }

    /// Appends an optimization point. On error the plan is left unchanged.
    pub fn add_point(&mut self, bitrate: f32, extra_layers: i32) -> J2kResult<()> {
        if !(bitrate > 0.0) {
            return Err(J2kError::config(format!(
                "target bitrate must be positive, got {bitrate}"
            )));
        }
        let extra_layers = u32::try_from(extra_layers).map_err(|_| {
            J2kError::config(format!(
                "number of extra layers must be 0 or more, got {extra_layers}"
            ))
        })?;
        if let Some(last) = self.points.last()
            && last.target_bitrate >= bitrate
        {
            return Err(J2kError::config(format!(
                "target bitrate {bitrate} must be higher than the preceding {}",
                last.target_bitrate
            )));
        }
        let total_layers = extra_layers
            .checked_add(1)
            .and_then(|n| self.total_layers.checked_add(n))
            .ok_or_else(|| {
                J2kError::config(format!(
                    "{extra_layers} extra layers overflow the layer count"
                ))
            })?;
        if bitrate > self.overall_bitrate {
            warn!(
                "layer target {bitrate} exceeds the overall bitrate {}",
                self.overall_bitrate
            );
        }

        trace!("layer point {bitrate} bpp with {extra_layers} extra layers");
        self.points.push(LayerPoint {
            target_bitrate: bitrate,
            extra_layers,
        });
        self.total_layers = total_layers;
        Ok(())
    }

    pub fn overall_bitrate(&self) -> f32 {
        self.overall_bitrate
    }

    pub fn points(&self) -> &[LayerPoint] {
        &self.points
    }

    /// Target bitrate of optimization point `n`; the overall bitrate past the
    /// explicit points.
    pub fn target_bitrate(&self, n: usize) -> f32 {
        self.points
            .get(n)
            .map_or(self.overall_bitrate, |p| p.target_bitrate)
    }

    pub fn extra_layers(&self, n: usize) -> u32 {
        self.points.get(n).map_or(0, |p| p.extra_layers)
    }

    pub fn total_layers(&self) -> u32 {
        self.total_layers
    }

    /// Number of optimization points, the overall bitrate included.
    pub fn num_optimization_points(&self) -> usize {
        self.points.len() + 1
    }

    /// Builds a plan from a layer option such as `"0.25 +2 0.5 1.0 +4"`.
    ///
    /// Every number is a target bitrate, optionally followed by `+n` extra
    /// layers. The single word `sl` requests a single layer at `overall_bitrate`.
    pub fn parse(option: &str, overall_bitrate: f32) -> J2kResult<Self> {
        let mut plan = Self::new(overall_bitrate)?;
        let tokens = tokenize(option)?;

        if let [Token::Word(w)] = tokens.as_slice()
            && w.eq_ignore_ascii_case("sl")
        {
            return Ok(plan);
        }

        let mut pending_rate = None;
        let mut expecting_layers = false;
        for token in tokens {
            match token {
                Token::Plus => {
                    if pending_rate.is_none() || expecting_layers {
                        return Err(J2kError::config(
                            "layer count without a preceding rate",
                        ));
                    }
                    expecting_layers = true;
                }
                Token::Number(n) if expecting_layers => {
                    let Some(rate) = pending_rate.take() else {
                        return Err(J2kError::config("layer count without a preceding rate"));
                    };
                    if n.fract() != 0.0 {
                        return Err(J2kError::config(format!("layer count {n} is not an integer")));
                    }
                    if !(f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&n) {
                        return Err(J2kError::config(format!("layer count {n} is out of range")));
                    }
                    plan.add_point(rate, n as i32)?;
                    expecting_layers = false;
                }
                Token::Number(n) => {
                    if let Some(rate) = pending_rate.replace(n as f32) {
                        plan.add_point(rate, 0)?;
                    }
                }
                Token::Word(w) if w.eq_ignore_ascii_case("sl") => {
                    return Err(J2kError::config("'sl' must be used alone"));
                }
                Token::Word(w) => {
                    return Err(J2kError::config(format!("unknown layer option '{w}'")));
                }
            }
        }

        if expecting_layers {
            return Err(J2kError::config("missing layer count after '+'"));
        }
        if let Some(rate) = pending_rate {
            plan.add_point(rate, 0)?;
        }
        Ok(plan)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Word(String),
}

fn tokenize(option: &str) -> J2kResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = option.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
        } else if ch == '+' {
            chars.next();
            tokens.push(Token::Plus);
        } else {
            let numeric = ch.is_ascii_digit() || ch == '.' || ch == '-';
            let mut end = start;
            while let Some(&(i, c)) = chars.peek() {
                let same_class = if numeric {
                    c.is_ascii_digit() || c == '.' || c == '-' || c == 'e' || c == 'E'
                } else {
                    c.is_alphanumeric()
                };
                if !same_class {
                    break;
                }
                end = i + c.len_utf8();
                chars.next();
            }
            if end == start {
                return Err(J2kError::config(format!(
                    "unexpected '{ch}' in layer option '{option}'"
                )));
            }
            let text = &option[start..end];
            if numeric {
                let value = text.parse::<f64>().map_err(|_| {
                    J2kError::config(format!("bad number '{text}' in layer option"))
                })?;
                tokens.push(Token::Number(value));
            } else {
                tokens.push(Token::Word(text.to_string()));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_arithmetic() {
        let mut plan = LayerPlan::new(2.0).unwrap();
        plan.add_point(0.5, 2).unwrap();
        plan.add_point(1.0, 0).unwrap();

        assert_eq!(plan.total_layers(), 5);
        assert_eq!(plan.num_optimization_points(), 3);
        assert_eq!(plan.target_bitrate(0), 0.5);
        assert_eq!(plan.target_bitrate(1), 1.0);
        assert_eq!(plan.target_bitrate(2), 2.0);
        assert_eq!(plan.extra_layers(0), 2);
        assert_eq!(plan.extra_layers(1), 0);
        assert_eq!(plan.extra_layers(2), 0);
    }

    #[test]
    fn test_rejected_point_leaves_plan_unchanged() {
        let mut plan = LayerPlan::new(4.0).unwrap();
        plan.add_point(1.0, 1).unwrap();
        let before = plan.clone();

        assert!(plan.add_point(1.0, 0).is_err());
        assert!(plan.add_point(0.5, 0).is_err());
        assert!(plan.add_point(-1.0, 0).is_err());
        assert!(plan.add_point(0.0, 0).is_err());
        assert!(plan.add_point(f32::NAN, 0).is_err());
        assert!(plan.add_point(2.0, -1).is_err());
        assert_eq!(plan, before);
    }

    #[test]
    fn test_layer_count_overflow_is_rejected() {
        let mut plan = LayerPlan::new(4.0).unwrap();
        plan.add_point(1.0, i32::MAX).unwrap();
        assert_eq!(plan.total_layers(), 2 + i32::MAX as u32);
        let before = plan.clone();

        assert!(matches!(plan.add_point(2.0, i32::MAX), Err(J2kError::Config(_))));
        assert_eq!(plan, before);
        plan.add_point(2.0, 0).unwrap();
        assert_eq!(plan.total_layers(), 3 + i32::MAX as u32);
    }

    #[test]
    fn test_overall_bitrate_must_be_positive() {
        assert!(LayerPlan::new(0.0).is_err());
        assert!(LayerPlan::new(-3.0).is_err());
        assert!(LayerPlan::new(f32::NAN).is_err());
    }

    #[test]
    fn test_points_above_overall_are_kept() {
        let mut plan = LayerPlan::new(1.0).unwrap();
        plan.add_point(3.0, 0).unwrap();
        assert_eq!(plan.target_bitrate(0), 3.0);
        assert_eq!(plan.target_bitrate(1), 1.0);
    }

    #[test]
    fn test_parse() {
        let plan = LayerPlan::parse("0.25 +2 0.5 1.0+4", 2.0).unwrap();
        assert_eq!(plan.points().len(), 3);
        assert_eq!(plan.extra_layers(0), 2);
        assert_eq!(plan.target_bitrate(1), 0.5);
        assert_eq!(plan.extra_layers(1), 0);
        assert_eq!(plan.extra_layers(2), 4);
        assert_eq!(plan.total_layers(), 1 + 3 + 1 + 5);

        let single = LayerPlan::parse("sl", 2.0).unwrap();
        assert_eq!(single.total_layers(), 1);
        assert_eq!(single.num_optimization_points(), 1);

        let empty = LayerPlan::parse("", 2.0).unwrap();
        assert_eq!(empty.total_layers(), 1);
    }

    #[test]
    fn test_parse_errors() {
        assert!(LayerPlan::parse("+2", 2.0).is_err());
        assert!(LayerPlan::parse("0.5 +", 2.0).is_err());
        assert!(LayerPlan::parse("0.5 + + 2", 2.0).is_err());
        assert!(LayerPlan::parse("0.5 sl", 2.0).is_err());
        assert!(LayerPlan::parse("fast", 2.0).is_err());
        assert!(LayerPlan::parse("1.0 0.5", 2.0).is_err());
        assert!(LayerPlan::parse("0.5 +1.5", 2.0).is_err());
        assert!(LayerPlan::parse("0.5 +-1", 2.0).is_err());
        assert!(LayerPlan::parse("0.5 ;", 2.0).is_err());
        assert!(matches!(
            LayerPlan::parse("0.5 +1e12", 2.0),
            Err(J2kError::Config(_))
        ));
        assert!(LayerPlan::parse("0.5 +3000000000", 2.0).is_err());
        assert_eq!(
            LayerPlan::parse("0.5 +2147483647", 2.0).unwrap().extra_layers(0),
            i32::MAX as u32
        );
    }
}
