//! Per tile-component parameter resolution.
//!
//! Every coding parameter of a JPEG 2000 encoder (quantization type, guard
//! bits, wavelet filters, ...) can be given a value for the whole image, for
//! a tile, for a component, or for a single tile-component. [`SpecGrid`]
//! stores the four levels and records, for every cell, which level is
//! authoritative. A more specific setting always wins over a less specific
//! one, regardless of the order in which they were made.
//!
//! Grids are usually built from an option string such as
//! `"reversible t1 c0,2 derived c3-5 expounded"`: `t` and `c` words select
//! tiles and components, and the following value is applied to the
//! selection.

use std::collections::HashMap;

use log::debug;

use crate::error::{J2kError, J2kResult};

/// The level a cell takes its value from, ordered by specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SpecKind {
    #[default]
    Default,
    ComponentDefault,
    TileDefault,
    TileComponent,
}

/// Which kinds of override a parameter family accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecScope {
    /// Values may only vary per tile.
    Tile,
    /// Values may only vary per component.
    Component,
    /// Values may vary per tile, per component, and per tile-component.
    TileComponent,
}

impl SpecScope {
    fn ensure_allows(self, kind: SpecKind) -> J2kResult<()> {
        let allowed = match kind {
            SpecKind::Default => true,
            SpecKind::TileDefault => self != Self::Component,
            SpecKind::ComponentDefault => self != Self::Tile,
            SpecKind::TileComponent => self == Self::TileComponent,
        };
        if allowed {
            Ok(())
        } else {
            Err(J2kError::config(format!(
                "{kind:?} values cannot be specified for a {self:?}-only option"
            )))
        }
    }
}

#[derive(Debug, Clone)]
struct Overrides<V> {
    num_tiles: usize,
    num_components: usize,
    kinds: Vec<SpecKind>,
    tile_defaults: Vec<Option<V>>,
    comp_defaults: Vec<Option<V>>,
    tile_comp: HashMap<(usize, usize), V>,
}

impl<V> Overrides<V> {
    fn new(num_tiles: usize, num_components: usize) -> Self {
        Self {
            num_tiles,
            num_components,
            kinds: vec![SpecKind::Default; num_tiles * num_components],
            tile_defaults: (0..num_tiles).map(|_| None).collect(),
            comp_defaults: (0..num_components).map(|_| None).collect(),
            tile_comp: HashMap::new(),
        }
    }

    fn kind(&self, t: usize, c: usize) -> SpecKind {
        self.kinds[t * self.num_components + c]
    }

    fn set_kind(&mut self, t: usize, c: usize, kind: SpecKind) {
        self.kinds[t * self.num_components + c] = kind;
    }

    fn raise_kind(&mut self, t: usize, c: usize, kind: SpecKind) {
        if self.kind(t, c) < kind {
            self.set_kind(t, c, kind);
        }
    }

    fn set_tile_default(&mut self, t: usize, value: V) {
        for c in 0..self.num_components {
            self.raise_kind(t, c, SpecKind::TileDefault);
        }
        self.tile_defaults[t] = Some(value);
    }

    fn set_comp_default(&mut self, c: usize, value: V) {
        for t in 0..self.num_tiles {
            self.raise_kind(t, c, SpecKind::ComponentDefault);
        }
        self.comp_defaults[c] = Some(value);
    }

    fn set_tile_comp(&mut self, t: usize, c: usize, value: V) {
        self.set_kind(t, c, SpecKind::TileComponent);
        self.tile_comp.insert((t, c), value);
    }

    fn unresolved_cells(&self) -> usize {
        self.kinds.iter().filter(|&&k| k == SpecKind::Default).count()
    }

    /// Takes the value of cell (0, 0) out of its override table and turns
    /// every cell that shared that source back into a default cell.
    fn promote_first_cell(&mut self) -> Option<V> {
        match self.kind(0, 0) {
            SpecKind::Default => None,
            SpecKind::TileDefault => {
                for c in 0..self.num_components {
                    if self.kind(0, c) == SpecKind::TileDefault {
                        self.set_kind(0, c, SpecKind::Default);
                    }
                }
                self.tile_defaults[0].take()
            }
            SpecKind::ComponentDefault => {
                for t in 0..self.num_tiles {
                    if self.kind(t, 0) == SpecKind::ComponentDefault {
                        self.set_kind(t, 0, SpecKind::Default);
                    }
                }
                self.comp_defaults[0].take()
            }
            SpecKind::TileComponent => {
                self.set_kind(0, 0, SpecKind::Default);
                self.tile_comp.remove(&(0, 0))
            }
        }
    }
}

/// A parameter value for every tile-component of an image.
#[derive(Debug, Clone)]
pub struct SpecGrid<V> {
    scope: SpecScope,
    default: V,
    overrides: Overrides<V>,
}

impl<V> SpecGrid<V> {
    /// Creates a grid where every cell resolves to `default`.
    ///
    /// Decoders use this and fill in overrides as they read marker segments.
    pub fn new(scope: SpecScope, num_tiles: usize, num_components: usize, default: V) -> Self {
        Self {
            scope,
            default,
            overrides: Overrides::new(num_tiles, num_components),
        }
    }

    pub fn scope(&self) -> SpecScope {
        self.scope
    }

    pub fn num_tiles(&self) -> usize {
        self.overrides.num_tiles
    }

    pub fn num_components(&self) -> usize {
        self.overrides.num_components
    }

    fn check_tile(&self, t: usize) -> J2kResult<()> {
        if t < self.num_tiles() {
            Ok(())
        } else {
            Err(J2kError::config(format!(
                "tile index {t} out of range (image has {} tiles)",
                self.num_tiles()
            )))
        }
    }

    fn check_component(&self, c: usize) -> J2kResult<()> {
        if c < self.num_components() {
            Ok(())
        } else {
            Err(J2kError::config(format!(
                "component index {c} out of range (image has {} components)",
                self.num_components()
            )))
        }
    }

    pub fn set_default(&mut self, value: V) {
        self.default = value;
    }

    pub fn set_tile_default(&mut self, t: usize, value: V) -> J2kResult<()> {
        self.scope.ensure_allows(SpecKind::TileDefault)?;
        self.check_tile(t)?;
        self.overrides.set_tile_default(t, value);
        Ok(())
    }

    pub fn set_comp_default(&mut self, c: usize, value: V) -> J2kResult<()> {
        self.scope.ensure_allows(SpecKind::ComponentDefault)?;
        self.check_component(c)?;
        self.overrides.set_comp_default(c, value);
        Ok(())
    }

    pub fn set_tile_comp(&mut self, t: usize, c: usize, value: V) -> J2kResult<()> {
        self.scope.ensure_allows(SpecKind::TileComponent)?;
        self.check_tile(t)?;
        self.check_component(c)?;
        self.overrides.set_tile_comp(t, c, value);
        Ok(())
    }

    /// Returns the value in effect for tile `t`, component `c`.
    ///
    /// # Panics
    ///
    /// Panics if `t` or `c` is outside the grid.
    pub fn get(&self, t: usize, c: usize) -> &V {
        assert!(
            t < self.num_tiles() && c < self.num_components(),
            "cell ({t}, {c}) outside a {}x{} grid",
            self.num_tiles(),
            self.num_components()
        );
        match self.overrides.kind(t, c) {
            SpecKind::Default => &self.default,
            SpecKind::ComponentDefault => self.comp_default(c),
            SpecKind::TileDefault => self.tile_default(t),
            // A tile-component kind always has its entry in the table.
            SpecKind::TileComponent => &self.overrides.tile_comp[&(t, c)],
        }
    }

    pub fn kind(&self, t: usize, c: usize) -> SpecKind {
        self.overrides.kind(t, c)
    }

    pub fn default_value(&self) -> &V {
        &self.default
    }

    /// The default of tile `t`, or the global default if the tile has none.
    pub fn tile_default(&self, t: usize) -> &V {
        self.overrides.tile_defaults[t].as_ref().unwrap_or(&self.default)
    }

    /// The default of component `c`, or the global default if it has none.
    pub fn comp_default(&self, c: usize) -> &V {
        self.overrides.comp_defaults[c].as_ref().unwrap_or(&self.default)
    }

    pub fn is_tile_specified(&self, t: usize) -> bool {
        self.overrides.tile_defaults.get(t).is_some_and(Option::is_some)
    }

    pub fn is_comp_specified(&self, c: usize) -> bool {
        self.overrides.comp_defaults.get(c).is_some_and(Option::is_some)
    }

    pub fn is_tile_comp_specified(&self, t: usize, c: usize) -> bool {
        self.overrides.tile_comp.contains_key(&(t, c))
    }

    /// Iterates over `(tile, component, value)` in tile-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &V)> + '_ {
        let nc = self.num_components();
        (0..self.num_tiles())
            .flat_map(move |t| (0..nc).map(move |c| (t, c)))
            .map(|(t, c)| (t, c, self.get(t, c)))
    }
}

impl<V: Clone> SpecGrid<V> {
    /// Builds a grid from a whitespace separated option string.
    ///
    /// `parse_value` turns a value word into a value. `fallback` supplies the
    /// global default when the option leaves some cells unspecified and sets
    /// no default of its own; it is not called otherwise.
    pub fn parse<P, F>(
        scope: SpecScope,
        num_tiles: usize,
        num_components: usize,
        option: &str,
        mut parse_value: P,
        fallback: F,
    ) -> J2kResult<Self>
    where
        P: FnMut(&str) -> J2kResult<V>,
        F: FnOnce() -> J2kResult<V>,
    {
        if num_tiles == 0 || num_components == 0 {
            return Err(J2kError::config(format!(
                "cannot build a {num_tiles}x{num_components} specification grid"
            )));
        }

        let mut overrides = Overrides::new(num_tiles, num_components);
        let mut default = None;
        let mut tiles: Option<Vec<bool>> = None;
        let mut components: Option<Vec<bool>> = None;

        for word in option.split_whitespace() {
            let lower = word.to_ascii_lowercase();
            match lower.as_bytes()[0] {
                b't' => {
                    scope.ensure_allows(SpecKind::TileDefault)?;
                    tiles = Some(parse_index_set(&lower, num_tiles)?);
                }
                b'c' => {
                    scope.ensure_allows(SpecKind::ComponentDefault)?;
                    components = Some(parse_index_set(&lower, num_components)?);
                }
                _ => {
                    let value = parse_value(&lower)?;
                    match (tiles.take(), components.take()) {
                        (None, None) => default = Some(value),
                        (Some(tiles), None) => {
                            for t in selected(&tiles) {
                                overrides.set_tile_default(t, value.clone());
                            }
                        }
                        (None, Some(components)) => {
                            for c in selected(&components) {
                                overrides.set_comp_default(c, value.clone());
                            }
                        }
                        (Some(tiles), Some(components)) => {
                            scope.ensure_allows(SpecKind::TileComponent)?;
                            for t in selected(&tiles) {
                                for c in selected(&components) {
                                    overrides.set_tile_comp(t, c, value.clone());
                                }
                            }
                        }
                    }
                }
            }
        }

        if tiles.is_some() || components.is_some() {
            return Err(J2kError::config(format!(
                "selection without a value at the end of '{option}'"
            )));
        }

        let default = match default {
            Some(value) => value,
            None if overrides.unresolved_cells() > 0 => {
                debug!(
                    "{} cells have no explicit value, using the fallback default",
                    overrides.unresolved_cells()
                );
                fallback()?
            }
            None => {
                debug!("every cell is specified, promoting cell (0, 0) to the default");
                overrides
                    .promote_first_cell()
                    .ok_or_else(|| J2kError::config("grid has no value for cell (0, 0)"))?
            }
        };

        Ok(Self {
            scope,
            default,
            overrides,
        })
    }
}

impl<V: Ord> SpecGrid<V> {
    /// The largest value in use, the default included.
    pub fn max(&self) -> &V {
        self.iter().map(|(_, _, v)| v).fold(&self.default, Ord::max)
    }

    /// The smallest value in use, the default included.
    pub fn min(&self) -> &V {
        self.iter().map(|(_, _, v)| v).fold(&self.default, Ord::min)
    }

    pub fn max_in_comp(&self, c: usize) -> Option<&V> {
        (0..self.num_tiles()).map(|t| self.get(t, c)).max()
    }

    pub fn min_in_comp(&self, c: usize) -> Option<&V> {
        (0..self.num_tiles()).map(|t| self.get(t, c)).min()
    }

    pub fn max_in_tile(&self, t: usize) -> Option<&V> {
        (0..self.num_components()).map(|c| self.get(t, c)).max()
    }

    pub fn min_in_tile(&self, t: usize) -> Option<&V> {
        (0..self.num_components()).map(|c| self.get(t, c)).min()
    }
}

fn selected(set: &[bool]) -> impl Iterator<Item = usize> + '_ {
    set.iter()
        .enumerate()
        .filter_map(|(i, &on)| on.then_some(i))
}

/// Parses a tile or component selection such as `t0,2-4` into a mask of
/// `max_index` entries. The leading letter is ignored.
pub fn parse_index_set(word: &str, max_index: usize) -> J2kResult<Vec<bool>> {
    let body = word.get(1..).unwrap_or_default();
    if body.is_empty() {
        return Err(J2kError::config(format!("'{word}' selects no index")));
    }

    let parse_index = |text: &str| {
        text.parse::<usize>()
            .map_err(|_| J2kError::config(format!("bad index '{text}' in '{word}'")))
    };

    let mut set = vec![false; max_index];
    for part in body.split(',') {
        let (first, last) = match part.split_once('-') {
            Some((first, last)) => (parse_index(first)?, parse_index(last)?),
            None => {
                let index = parse_index(part)?;
                (index, index)
            }
        };
        if first > last {
            return Err(J2kError::config(format!(
                "decreasing range {first}-{last} in '{word}'"
            )));
        }
        if last >= max_index {
            return Err(J2kError::config(format!(
                "index {last} in '{word}' out of range (maximum {})",
                max_index.saturating_sub(1)
            )));
        }
        set[first..=last].fill(true);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_u32(word: &str) -> J2kResult<u32> {
        match word.parse::<u32>() {
            Ok(0) | Err(_) => Err(J2kError::config(format!("bad value '{word}'"))),
            Ok(v) => Ok(v),
        }
    }

    fn grid(option: &str, nt: usize, nc: usize) -> J2kResult<SpecGrid<u32>> {
        SpecGrid::parse(SpecScope::TileComponent, nt, nc, option, parse_u32, || Ok(99))
    }

    #[test]
    fn test_tile_comp_override_only_changes_one_cell() {
        let mut g = SpecGrid::new(SpecScope::TileComponent, 3, 3, 1u32);
        g.set_tile_default(1, 5).unwrap();
        g.set_tile_comp(1, 2, 7).unwrap();

        for c in 0..3 {
            assert_eq!(*g.get(0, c), 1);
            assert_eq!(*g.get(2, c), 1);
        }
        assert_eq!(*g.get(1, 0), 5);
        assert_eq!(*g.get(1, 1), 5);
        assert_eq!(*g.get(1, 2), 7);
        assert_eq!(g.kind(1, 2), SpecKind::TileComponent);
        assert_eq!(g.kind(1, 1), SpecKind::TileDefault);
    }

    #[test]
    fn test_specificity_does_not_depend_on_order() {
        let mut g = SpecGrid::new(SpecScope::TileComponent, 2, 2, 1u32);
        g.set_tile_comp(0, 0, 9).unwrap();
        g.set_tile_default(0, 4).unwrap();
        g.set_comp_default(0, 3).unwrap();

        assert_eq!(*g.get(0, 0), 9);
        assert_eq!(*g.get(0, 1), 4);
        // Tile defaults are more specific than component defaults.
        assert_eq!(*g.get(1, 0), 3);
        assert_eq!(*g.get(1, 1), 1);
    }

    #[test]
    fn test_parse_selections() {
        let g = grid("2 t1 3 c0,2 4 t0 c1 5", 2, 3).unwrap();
        assert_eq!(*g.default_value(), 2);
        assert_eq!(*g.get(0, 0), 4);
        assert_eq!(*g.get(0, 1), 5);
        assert_eq!(*g.get(0, 2), 4);
        assert_eq!(*g.get(1, 0), 3);
        assert_eq!(*g.get(1, 1), 3);
        assert!(g.is_tile_specified(1));
        assert!(g.is_comp_specified(2));
        assert!(g.is_tile_comp_specified(0, 1));
        assert!(!g.is_tile_comp_specified(1, 1));
    }

    #[test]
    fn test_fallback_default_when_cells_remain() {
        let g = grid("t0 6", 2, 1).unwrap();
        assert_eq!(*g.default_value(), 99);
        assert_eq!(*g.get(0, 0), 6);
        assert_eq!(*g.get(1, 0), 99);
    }

    #[test]
    fn test_fallback_not_called_when_default_given() {
        let g = SpecGrid::parse(SpecScope::TileComponent, 1, 1, "8", parse_u32, || {
            Err(J2kError::config("fallback must not run"))
        })
        .unwrap();
        assert_eq!(*g.get(0, 0), 8);
    }

    #[test]
    fn test_fully_specified_grid_promotes_first_cell() {
        let g = grid("t0 6 t1 7", 2, 2).unwrap();
        assert_eq!(*g.default_value(), 6);
        assert_eq!(g.kind(0, 0), SpecKind::Default);
        assert_eq!(g.kind(0, 1), SpecKind::Default);
        assert_eq!(g.kind(1, 0), SpecKind::TileDefault);
        assert!(!g.is_tile_specified(0));
        assert_eq!(*g.get(0, 1), 6);
        assert_eq!(*g.get(1, 1), 7);

        let g = grid("c0 3 c1 4", 2, 2).unwrap();
        assert_eq!(*g.default_value(), 3);
        assert_eq!(g.kind(1, 0), SpecKind::Default);
        assert_eq!(*g.get(1, 0), 3);
        assert_eq!(*g.get(1, 1), 4);

        let g = grid("t0 c0 5 t0 c1 6", 1, 2).unwrap();
        assert_eq!(*g.default_value(), 5);
        assert_eq!(g.kind(0, 0), SpecKind::Default);
        assert_eq!(*g.get(0, 1), 6);
    }

    #[test]
    fn test_tile_comp_kind_matches_table() {
        let grids = [
            grid("t0 c0 5 t0 c1 6 t1 7", 2, 2).unwrap(),
            grid("t0 c0 5 t0 c1 6", 1, 2).unwrap(),
            grid("3 c1 4 t1 c0,1 8", 2, 2).unwrap(),
        ];
        for g in &grids {
            for (t, c, _) in g.iter() {
                assert_eq!(
                    g.kind(t, c) == SpecKind::TileComponent,
                    g.is_tile_comp_specified(t, c),
                    "cell ({t}, {c})"
                );
            }
        }
        // (0, 0) was promoted out of the tile-component table.
        assert_eq!(*grids[1].get(0, 0), 5);
        assert_eq!(*grids[2].get(1, 1), 8);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(grid("t 3", 2, 2), Err(J2kError::Config(_))));
        assert!(matches!(grid("t2 3", 2, 2), Err(J2kError::Config(_))));
        assert!(matches!(grid("c1-0 3", 2, 2), Err(J2kError::Config(_))));
        assert!(matches!(grid("0", 2, 2), Err(J2kError::Config(_))));
        assert!(matches!(grid("-4", 2, 2), Err(J2kError::Config(_))));
        assert!(matches!(grid("abc", 2, 2), Err(J2kError::Config(_))));
        assert!(matches!(grid("3 t1", 2, 2), Err(J2kError::Config(_))));
        assert!(matches!(grid("3", 0, 2), Err(J2kError::Config(_))));
    }

    #[test]
    fn test_scope_restrictions() {
        let tile_only = SpecGrid::parse(SpecScope::Tile, 2, 2, "c0 3", parse_u32, || Ok(1));
        assert!(tile_only.is_err());

        let mut comp_only = SpecGrid::new(SpecScope::Component, 2, 2, 1u32);
        assert!(comp_only.set_tile_default(0, 3).is_err());
        assert!(comp_only.set_tile_comp(0, 0, 3).is_err());
        comp_only.set_comp_default(1, 3).unwrap();
        assert_eq!(*comp_only.get(1, 1), 3);
    }

    #[test]
    fn test_setters_check_indices() {
        let mut g = SpecGrid::new(SpecScope::TileComponent, 2, 2, 1u32);
        assert!(g.set_tile_default(2, 3).is_err());
        assert!(g.set_comp_default(2, 3).is_err());
        assert!(g.set_tile_comp(0, 5, 3).is_err());
    }

    #[test]
    fn test_min_max() {
        let g = grid("4 t0 c1 9 t1 2", 2, 2).unwrap();
        assert_eq!(*g.max(), 9);
        assert_eq!(*g.min(), 2);
        assert_eq!(g.max_in_comp(0), Some(&4));
        assert_eq!(g.min_in_comp(1), Some(&2));
        assert_eq!(g.max_in_tile(0), Some(&9));
        assert_eq!(g.min_in_tile(1), Some(&2));
    }

    #[test]
    fn test_parse_index_set() {
        assert_eq!(
            parse_index_set("t0,2-4", 6).unwrap(),
            vec![true, false, true, true, true, false]
        );
        assert_eq!(parse_index_set("c3", 4).unwrap(), vec![false, false, false, true]);
        assert!(parse_index_set("t1,", 4).is_err());
        assert!(parse_index_set("t1-", 4).is_err());
        assert!(parse_index_set("t4", 4).is_err());
    }
}
