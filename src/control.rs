use std::collections::{HashMap, HashSet};

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use tracing::debug;

use crate::error::{Error, Result};
use crate::machine::{Event, Machine};

/// Grid coordinate: x grows east, y grows south.
pub type Pos = (i64, i64);

/// An external agent steering a single machine.
///
/// The agent sees every output value in order and is asked for a value
/// whenever the machine blocks for input.
pub trait Controller {
    /// Next value to feed, or `None` to stop driving.
    fn input(&mut self) -> Option<i64>;

    /// Interpret one output value.
    fn output(&mut self, value: i64) -> Result<()>;
}

/// Why [`drive`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Halted,
    /// The controller had nothing more to say; the machine is left blocked.
    Stopped,
}

/// Run `machine` under `controller` until it halts or the controller stops.
///
/// Controllers speak in small integers; an output that does not fit an
/// `i64` is [`Error::UnexpectedOutput`].
pub fn drive<C: Controller>(machine: &mut Machine, controller: &mut C) -> Result<Outcome> {
    loop {
        match machine.resume()? {
            Event::Output(value) => match value.to_i64() {
                Some(small) => controller.output(small)?,
                None => return Err(Error::UnexpectedOutput { value }),
            },
            Event::AwaitingInput => match controller.input() {
                Some(value) => machine.feed(value),
                None => return Ok(Outcome::Stopped),
            },
            Event::Halted => return Ok(Outcome::Halted),
        }
    }
}

fn unexpected(value: i64) -> Error {
    Error::UnexpectedOutput {
        value: BigInt::from(value),
    }
}

fn bounds<'a>(cells: impl Iterator<Item = &'a Pos>) -> Option<(Pos, Pos)> {
    cells.fold(None, |acc, &(x, y)| match acc {
        None => Some(((x, y), (x, y))),
        Some(((x0, y0), (x1, y1))) => Some(((x0.min(x), y0.min(y)), (x1.max(x), y1.max(y)))),
    })
}

fn render(cells: &[Pos], glyph: impl Fn(Pos) -> char) -> String {
    let Some(((x0, y0), (x1, y1))) = bounds(cells.iter()) else {
        return String::new();
    };
    let mut out = String::new();
    for y in y0..=y1 {
        for x in x0..=x1 {
            out.push(glyph((x, y)));
        }
        out.push('\n');
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Colour,
    Turn,
}

/// Hull painting robot.
///
/// Reports the colour under the robot (0 black, 1 white), then expects
/// pairs of outputs: the colour to paint, and a turn (0 left, 1 right)
/// after which it moves one panel forward.
pub struct HullPainter {
    pos: Pos,
    heading: Pos,
    colours: HashMap<Pos, i64>,
    painted: HashSet<Pos>,
    expect: Expect,
}

impl HullPainter {
    /// Start facing north on a panel of `start_colour`; every other panel
    /// starts black.
    pub fn new(start_colour: i64) -> Self {
        let mut colours = HashMap::new();
        colours.insert((0, 0), start_colour);
        Self {
            pos: (0, 0),
            heading: (0, -1),
            colours,
            painted: HashSet::new(),
            expect: Expect::Colour,
        }
    }

    pub fn position(&self) -> Pos {
        self.pos
    }

    pub fn colour(&self, pos: Pos) -> i64 {
        self.colours.get(&pos).copied().unwrap_or(0)
    }

    /// Number of distinct panels painted at least once.
    pub fn painted_count(&self) -> usize {
        self.painted.len()
    }

    /// White panels as `#`, everything else as `.`, cropped to the white area.
    pub fn render(&self) -> String {
        let white: Vec<Pos> = self
            .colours
            .iter()
            .filter(|&(_, &c)| c == 1)
            .map(|(&p, _)| p)
            .collect();
        render(&white, |p| if self.colour(p) == 1 { '#' } else { '.' })
    }
}

impl Controller for HullPainter {
    fn input(&mut self) -> Option<i64> {
        Some(self.colour(self.pos))
    }

    fn output(&mut self, value: i64) -> Result<()> {
        match self.expect {
            Expect::Colour => {
                if !matches!(value, 0 | 1) {
                    return Err(unexpected(value));
                }
                self.colours.insert(self.pos, value);
                self.painted.insert(self.pos);
                self.expect = Expect::Turn;
            }
            Expect::Turn => {
                let (dx, dy) = self.heading;
                self.heading = match value {
                    0 => (dy, -dx),
                    1 => (-dy, dx),
                    _ => return Err(unexpected(value)),
                };
                self.pos = (self.pos.0 + self.heading.0, self.pos.1 + self.heading.1);
                self.expect = Expect::Colour;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    Wall,
    Open,
    Oxygen,
}

/// Movement command understood by the repair droid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North = 1,
    South = 2,
    West = 3,
    East = 4,
}

impl Direction {
    const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }

    fn apply(self, (x, y): Pos) -> Pos {
        match self {
            Direction::North => (x, y - 1),
            Direction::South => (x, y + 1),
            Direction::West => (x - 1, y),
            Direction::East => (x + 1, y),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Move {
    Explore(Direction),
    Backtrack(Direction),
}

struct Frame {
    came_from: Option<Direction>,
    untried: Vec<Direction>,
}

impl Frame {
    fn new(came_from: Option<Direction>) -> Self {
        Self {
            came_from,
            untried: Direction::ALL.to_vec(),
        }
    }
}

/// Builds a map of the area around a repair droid by depth-first
/// exploration with backtracking.
///
/// Status replies: 0 hit a wall (droid did not move), 1 moved, 2 moved onto
/// the oxygen system. Stops asking for moves once every reachable open
/// tile has been visited and the droid is back at its start.
pub struct DroidMapper {
    pos: Pos,
    grid: HashMap<Pos, Tile>,
    stack: Vec<Frame>,
    pending: Option<Move>,
}

impl Default for DroidMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl DroidMapper {
    pub fn new() -> Self {
        let mut grid = HashMap::new();
        grid.insert((0, 0), Tile::Open);
        Self {
            pos: (0, 0),
            grid,
            stack: vec![Frame::new(None)],
            pending: None,
        }
    }

    pub fn position(&self) -> Pos {
        self.pos
    }

    pub fn grid(&self) -> &HashMap<Pos, Tile> {
        &self.grid
    }

    pub fn oxygen(&self) -> Option<Pos> {
        self.grid
            .iter()
            .find(|&(_, &t)| t == Tile::Oxygen)
            .map(|(&p, _)| p)
    }

    pub fn is_done(&self) -> bool {
        self.stack.is_empty()
    }

    /// `#` wall, `.` open, `O` oxygen, blank unexplored.
    pub fn render(&self) -> String {
        let cells: Vec<Pos> = self.grid.keys().copied().collect();
        render(&cells, |p| match self.grid.get(&p) {
            Some(Tile::Wall) => '#',
            Some(Tile::Open) => '.',
            Some(Tile::Oxygen) => 'O',
            None => ' ',
        })
    }
}

impl Controller for DroidMapper {
    fn input(&mut self) -> Option<i64> {
        loop {
            let frame = self.stack.last_mut()?;
            match frame.untried.pop() {
                Some(dir) => {
                    if self.grid.contains_key(&dir.apply(self.pos)) {
                        continue;
                    }
                    self.pending = Some(Move::Explore(dir));
                    return Some(dir as i64);
                }
                None => {
                    let came_from = self.stack.pop().and_then(|f| f.came_from);
                    let Some(dir) = came_from else {
                        debug!(tiles = self.grid.len(), "exploration complete");
                        return None;
                    };
                    let back = dir.opposite();
                    self.pending = Some(Move::Backtrack(back));
                    return Some(back as i64);
                }
            }
        }
    }

    fn output(&mut self, value: i64) -> Result<()> {
        match (self.pending.take(), value) {
            (Some(Move::Explore(dir)), 0) => {
                self.grid.insert(dir.apply(self.pos), Tile::Wall);
            }
            (Some(Move::Explore(dir)), 1 | 2) => {
                self.pos = dir.apply(self.pos);
                let tile = if value == 2 { Tile::Oxygen } else { Tile::Open };
                self.grid.insert(self.pos, tile);
                self.stack.push(Frame::new(Some(dir)));
            }
            (Some(Move::Backtrack(dir)), 1 | 2) => {
                self.pos = dir.apply(self.pos);
            }
            _ => return Err(unexpected(value)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn painter_walkthrough() {
        let mut robot = HullPainter::new(0);
        let replies = [(1, 0), (0, 0), (1, 0), (1, 0), (0, 1), (1, 0), (1, 0)];
        let mut seen = Vec::new();
        for (colour, turn) in replies {
            seen.push(robot.input().unwrap());
            robot.output(colour).unwrap();
            robot.output(turn).unwrap();
        }
        assert_eq!(seen, vec![0, 0, 0, 0, 1, 0, 0]);
        assert_eq!(robot.painted_count(), 6);
        assert_eq!(robot.position(), (0, -1));
        assert_eq!(robot.colour((0, 0)), 0);
        assert_eq!(robot.colour((1, -1)), 1);
    }

    #[test]
    fn painter_rejects_bad_turn() {
        let mut robot = HullPainter::new(0);
        robot.output(1).unwrap();
        assert!(matches!(
            robot.output(7),
            Err(Error::UnexpectedOutput { value }) if value == BigInt::from(7)
        ));
    }

    #[test]
    fn drive_painter_program() {
        // Read the colour, paint white, turn left, halt.
        let mut m = Machine::new(&[3, 100, 104, 1, 104, 0, 99]);
        let mut robot = HullPainter::new(0);
        assert_eq!(drive(&mut m, &mut robot).unwrap(), Outcome::Halted);
        assert_eq!(m.peek(100), BigInt::from(0));
        assert_eq!(robot.painted_count(), 1);
        assert_eq!(robot.position(), (-1, 0));
        assert_eq!(robot.render(), "#\n");
    }

    #[test]
    fn oversized_output_stops_driving() {
        // Paint with colour 2^64.
        let mut m = Machine::new(&[3i64, 100, 1102, 4294967296, 4294967296, 9, 4, 9, 99, 0]);
        let mut robot = HullPainter::new(0);
        let err = drive(&mut m, &mut robot).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedOutput { value } if value == BigInt::from(1u128 << 64)
        ));
        assert_eq!(robot.painted_count(), 0);
    }

    #[test]
    fn painter_starting_white() {
        let mut m = Machine::new(&[3, 100, 4, 100, 104, 1, 99]);
        let mut robot = HullPainter::new(1);
        assert_eq!(drive(&mut m, &mut robot).unwrap(), Outcome::Halted);
        assert_eq!(robot.colour((0, 0)), 1);
        assert_eq!(robot.position(), (1, 0));
    }

    #[test]
    fn drive_mapper_walled_in() {
        // Every move hits a wall.
        let mut m = Machine::new(&[3, 100, 104, 0, 1105, 1, 0]);
        let mut droid = DroidMapper::new();
        assert_eq!(drive(&mut m, &mut droid).unwrap(), Outcome::Stopped);
        assert!(droid.is_done());
        assert_eq!(droid.grid().len(), 5);
        assert_eq!(droid.oxygen(), None);
        assert_eq!(droid.render(), " # \n#.#\n # \n");
    }

    /// Play the droid's side against a maze drawn in text; `D` marks the start.
    fn explore(maze: &[&str]) -> DroidMapper {
        let rows: Vec<Vec<u8>> = maze.iter().map(|r| r.bytes().collect()).collect();
        let start = rows
            .iter()
            .enumerate()
            .find_map(|(y, r)| r.iter().position(|&c| c == b'D').map(|x| (x as i64, y as i64)))
            .unwrap();
        let at = |(x, y): Pos| rows[(start.1 + y) as usize][(start.0 + x) as usize];

        let mut droid = DroidMapper::new();
        let mut real = (0, 0);
        while let Some(cmd) = droid.input() {
            let dir = Direction::ALL[(cmd - 1) as usize];
            let target = dir.apply(real);
            let status = match at(target) {
                b'#' => 0,
                b'O' => 2,
                _ => 1,
            };
            if status != 0 {
                real = target;
            }
            droid.output(status).unwrap();
            assert_eq!(droid.position(), real);
        }
        droid
    }

    #[test]
    fn mapper_explores_maze() {
        let droid = explore(&[
            "######", //
            "#D..##", //
            "#.#..#", //
            "#...O#", //
            "######",
        ]);
        assert_eq!(droid.position(), (0, 0));
        assert_eq!(droid.oxygen(), Some((3, 2)));
        let open = droid.grid().values().filter(|&&t| t != Tile::Wall).count();
        assert_eq!(open, 10);
        assert_eq!(
            droid.render(),
            " ###  \n#...# \n#.#..#\n#...O#\n #### \n"
        );
    }

    #[test]
    fn mapper_rejects_wall_on_backtrack() {
        let mut droid = DroidMapper::new();
        assert_eq!(droid.input(), Some(Direction::East as i64));
        droid.output(1).unwrap();
        // From (1, 0): east, south and north are walls; west is already known.
        for _ in 0..3 {
            droid.input().unwrap();
            droid.output(0).unwrap();
        }
        assert_eq!(droid.input(), Some(Direction::West as i64));
        assert!(matches!(
            droid.output(0),
            Err(Error::UnexpectedOutput { value }) if value == BigInt::from(0)
        ));
    }
}
