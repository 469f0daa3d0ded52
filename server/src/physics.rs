use shared::{
    BallState, ConnectionId, Direction, PlayerState, Side, BALL_RADIUS, BALL_SPEED,
    PADDLE_HEIGHT, PADDLE_SPEED, PADDLE_WIDTH, PLAYFIELD_HEIGHT, PLAYFIELD_WIDTH,
};

///Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector2 {
    ///Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is down, matching the playfield's screen coordinates.
    pub y: f32,
}

impl Vector2 {
    pub fn new(x: f32, y: f32) -> Self {
        Vector2 { x, y }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

///The ball. Position is its centre; velocity is displacement per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    pub position: Vector2,
    pub velocity: Vector2,
    pub radius: f32,
}

impl Ball {
    ///Creates a ball at the centre of the playfield.
    /// `toward_right` picks the horizontal serve direction and `spread` in `[0, 1)`
    /// picks the vertical component.
    pub fn serve(toward_right: bool, spread: f32) -> Self {
        let velocity_x = if toward_right { BALL_SPEED } else { -BALL_SPEED };
        Ball {
            position: Vector2::new(PLAYFIELD_WIDTH / 2.0, PLAYFIELD_HEIGHT / 2.0),
            velocity: Vector2::new(velocity_x, (spread - 0.5) * BALL_SPEED),
            radius: BALL_RADIUS,
        }
    }

    ///Advances the ball by one tick of velocity.
    pub fn integrate(&mut self) {
        self.position = self.position.add(&self.velocity);
    }

    ///Reflects off the top and bottom walls, clamping the ball inside them.
    ///Returns true if a wall was touched.
    pub fn resolve_walls(&mut self) -> bool {
        let top = self.radius;
        let bottom = PLAYFIELD_HEIGHT - self.radius;

        if self.position.y <= top || self.position.y >= bottom {
            self.velocity.y = -self.velocity.y;
            self.position.y = self.position.y.clamp(top, bottom);
            return true;
        }
        false
    }

    ///Bounces off `paddle` if the ball is touching its face and moving toward it.
    ///Returns true if a hit occurred.
    pub fn resolve_paddle(&mut self, paddle: &Paddle) -> bool {
        let within_paddle =
            self.position.y >= paddle.y && self.position.y <= paddle.y + PADDLE_HEIGHT;
        if !within_paddle {
            return false;
        }

        let hit = match paddle.side {
            Side::Left => {
                self.position.x - self.radius <= PADDLE_WIDTH && self.velocity.x < 0.0
            }
            Side::Right => {
                self.position.x + self.radius >= PLAYFIELD_WIDTH - PADDLE_WIDTH
                    && self.velocity.x > 0.0
            }
        };
        if !hit {
            return false;
        }

        self.velocity.x = -self.velocity.x;
        self.position.x = match paddle.side {
            Side::Left => PADDLE_WIDTH + self.radius,
            Side::Right => PLAYFIELD_WIDTH - PADDLE_WIDTH - self.radius,
        };
        self.velocity.y = deflection(paddle.hit_offset(self.position.y));
        true
    }

    ///Returns the side that scores if the ball has left the playfield horizontally.
    pub fn exit_side(&self) -> Option<Side> {
        if self.position.x < 0.0 {
            Some(Side::Right)
        } else if self.position.x > PLAYFIELD_WIDTH {
            Some(Side::Left)
        } else {
            None
        }
    }

    pub fn state(&self) -> BallState {
        BallState {
            x: self.position.x,
            y: self.position.y,
            velocity_x: self.velocity.x,
            velocity_y: self.velocity.y,
            radius: self.radius,
        }
    }
}

///Vertical velocity after a paddle hit at `hit_offset` (0 = top edge, 1 = bottom edge).
pub fn deflection(hit_offset: f32) -> f32 {
    (hit_offset - 0.5) * BALL_SPEED
}

///One player's paddle. `y` is the top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddle {
    pub owner: ConnectionId,
    pub y: f32,
    pub side: Side,
    pub connected: bool,
}

impl Paddle {
    pub const MAX_Y: f32 = PLAYFIELD_HEIGHT - PADDLE_HEIGHT;

    ///Creates a vertically centred paddle.
    pub fn new(owner: ConnectionId, side: Side) -> Self {
        Paddle {
            owner,
            y: PLAYFIELD_HEIGHT / 2.0 - PADDLE_HEIGHT / 2.0,
            side,
            connected: true,
        }
    }

    ///Moves one speed increment in `direction`, clamped to the playfield.
    pub fn apply(&mut self, direction: Direction) {
        let y = match direction {
            Direction::Up => self.y - PADDLE_SPEED,
            Direction::Down => self.y + PADDLE_SPEED,
            Direction::Stop => return,
        };
        self.y = y.clamp(0.0, Self::MAX_Y);
    }

    ///Where `ball_y` lies along the paddle, normalised to `[0, 1]`.
    pub fn hit_offset(&self, ball_y: f32) -> f32 {
        (ball_y - self.y) / PADDLE_HEIGHT
    }

    pub fn state(&self) -> PlayerState {
        PlayerState {
            id: self.owner,
            y: self.y,
            side: self.side,
            connected: self.connected,
        }
    }
}
