//! Breadth-first pathfinder over tile grids with optional toroidal wrap-around.

use gridstage_core::{GridCoord, OFF_GRID};

use crate::grid::TileGrid;

/// Neighbour order used while expanding the search: down, right, up, left.
///
/// The order decides which of several equally short routes is reported.
const EXPANSION_ORDER: [(i32, i32); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

/// Neighbour order used when listing next-step candidates: right, down, left, up.
const CANDIDATE_ORDER: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

/// Shape of the result produced by a search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// Full route from start to end, excluding the start tile.
    #[default]
    Path,
    /// Legal single steps around the end tile that the search has not visited.
    Next,
}

/// Treatment of neighbours that fall outside the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Edges {
    /// Opposite edges are connected; off-grid neighbours wrap modulo the grid size.
    #[default]
    Wrap,
    /// Off-grid neighbours are discarded.
    Bounded,
}

/// Parameters of a single search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Query {
    /// Tile the search starts from.
    pub start: GridCoord,
    /// Tile the search is looking for.
    pub end: GridCoord,
    /// Result shape.
    pub mode: SearchMode,
    /// Edge handling.
    pub edges: Edges,
}

impl Query {
    /// Full-route query between two tiles with wrapping edges.
    #[must_use]
    pub const fn path(start: GridCoord, end: GridCoord) -> Self {
        Self {
            start,
            end,
            mode: SearchMode::Path,
            edges: Edges::Wrap,
        }
    }

    /// Next-step query between two tiles with wrapping edges.
    #[must_use]
    pub const fn next(start: GridCoord, end: GridCoord) -> Self {
        Self {
            start,
            end,
            mode: SearchMode::Next,
            edges: Edges::Wrap,
        }
    }

    /// Replaces the edge handling.
    #[must_use]
    pub const fn with_edges(mut self, edges: Edges) -> Self {
        self.edges = edges;
        self
    }
}

/// Single tile of a search result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Step {
    /// Tile reached by the step.
    pub coord: GridCoord,
    /// Set when the step crossed a grid edge and wrapped around.
    pub wrapped: bool,
}

impl Step {
    /// Step onto `coord` without crossing an edge.
    #[must_use]
    pub const fn to(coord: GridCoord) -> Self {
        Self {
            coord,
            wrapped: false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Arrival {
    from: GridCoord,
    wrapped: bool,
}

/// Reusable search workspace.
///
/// Every call to [`Pathfinder::search`] runs a complete breadth-first search;
/// only the buffers are kept between calls.
#[derive(Clone, Debug, Default)]
pub struct Pathfinder {
    arrivals: Vec<Option<Arrival>>,
    frontier: Vec<GridCoord>,
    next_frontier: Vec<GridCoord>,
}

impl Pathfinder {
    /// Creates an empty workspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Searches `grid` for `query.end` starting at `query.start`.
    ///
    /// Returns an empty result when either endpoint is blocked or off-grid,
    /// or when the end cannot be reached.
    pub fn search(&mut self, grid: &TileGrid, query: Query) -> Vec<Step> {
        if !grid.is_walkable(query.start) || !grid.is_walkable(query.end) {
            return Vec::new();
        }

        if !self.expand(grid, query) {
            return Vec::new();
        }

        match query.mode {
            SearchMode::Path => self.trace_route(grid, query),
            SearchMode::Next => self.candidates(grid, query),
        }
    }

    /// Expands layer by layer until the end is found or the frontier dries up.
    ///
    /// A layer that reaches the end is still processed to completion; the end's
    /// predecessor is whichever frontier tile reached it last.
    fn expand(&mut self, grid: &TileGrid, query: Query) -> bool {
        self.arrivals.clear();
        self.arrivals.resize(grid.len(), None);
        self.frontier.clear();
        self.frontier.push(query.start);

        let mut found = false;
        while !found && !self.frontier.is_empty() {
            self.next_frontier.clear();

            for position in 0..self.frontier.len() {
                let current = self.frontier[position];
                for (dx, dy) in EXPANSION_ORDER {
                    let Some(step) = neighbour(grid, current, dx, dy, query.edges) else {
                        continue;
                    };
                    let Some(index) = grid.index(step.coord.x(), step.coord.y()) else {
                        continue;
                    };
                    let arrival = Arrival {
                        from: current,
                        wrapped: step.wrapped,
                    };

                    if step.coord == query.end {
                        self.arrivals[index] = Some(arrival);
                        found = true;
                    } else if self.arrivals[index].is_none() {
                        self.arrivals[index] = Some(arrival);
                        self.next_frontier.push(step.coord);
                    }
                }
            }

            std::mem::swap(&mut self.frontier, &mut self.next_frontier);
        }

        found
    }

    fn trace_route(&self, grid: &TileGrid, query: Query) -> Vec<Step> {
        let mut route = Vec::new();
        let mut current = query.end;

        while current != query.start {
            let Some(arrival) = grid
                .index(current.x(), current.y())
                .and_then(|index| self.arrivals[index])
            else {
                return Vec::new();
            };
            route.push(Step {
                coord: current,
                wrapped: arrival.wrapped,
            });
            if route.len() > grid.len() {
                return Vec::new();
            }
            current = arrival.from;
        }

        route.reverse();
        route
    }

    fn candidates(&self, grid: &TileGrid, query: Query) -> Vec<Step> {
        CANDIDATE_ORDER
            .into_iter()
            .filter_map(|(dx, dy)| neighbour(grid, query.end, dx, dy, query.edges))
            .filter(|step| {
                grid.index(step.coord.x(), step.coord.y())
                    .map_or(false, |index| self.arrivals[index].is_none())
            })
            .collect()
    }
}

/// Resolves the neighbour of `from` displaced by `(dx, dy)`.
///
/// Blocked tiles yield `None`. Off-grid tiles either wrap modulo the grid size
/// or are discarded, depending on `edges`; the wrapped tile is taken as is.
fn neighbour(grid: &TileGrid, from: GridCoord, dx: i32, dy: i32, edges: Edges) -> Option<Step> {
    let target = from.offset(dx, dy);
    let value = grid.value(target);
    if value >= 1 {
        return None;
    }
    if value != OFF_GRID {
        return Some(Step::to(target));
    }

    match edges {
        Edges::Bounded => None,
        Edges::Wrap => {
            let width = i32::try_from(grid.width()).ok().filter(|width| *width > 0)?;
            let height = i32::try_from(grid.height()).ok().filter(|height| *height > 0)?;
            let wrapped = GridCoord::new(target.x().rem_euclid(width), target.y().rem_euclid(height));
            Some(Step {
                coord: wrapped,
                wrapped: true,
            })
        }
    }
}
