//! 定时命令定义
//!
//! 每个控制请求对应一个可恢复的步骤序列（[`ScheduledCommand`]）：
//! 发出一帧、记录截止时间、在截止时间之前保持休眠，之后的 tick 再发出下一帧。
//! 序列的最后一帧发出后命令完成，由调度器移除。
//!
//! 步骤序列用带标签的枚举 `Program` 表示，每个变体只保存自己的进度，
//! 不持有任何外部资源。

use crate::config::SchedulerConfig;
use crate::state::VehicleState;
use carbus_can::{CanError, TxAdapter};
use carbus_protocol::{
    ButtonAction, ChimeCommand, ClusterMessageCommand, DomeLightButton, HeaterLevel, RawFrame,
    SeatHeaterButton, TractionControlButton, WindowCommand, WindowMask, WindowMotion,
};
use smallvec::SmallVec;
use std::time::{Duration, Instant};

/// 单个 tick 内发出的帧
///
/// 每种命令每个 tick 最多前进一步，命令种类只有 6 种，栈上预留 6 个位置即可避免堆分配。
pub type FrameBuffer = SmallVec<[RawFrame; 6]>;

/// 命令种类（同一种类同时最多一个活动实例）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    DomeLight,
    SeatHeater,
    Window,
    TractionControl,
    Chime,
    ClusterMessage,
}

/// 牵引力控制按键的按法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TractionMode {
    /// 短按：切换牵引力控制
    #[default]
    Toggle,
    /// 长按：完全关闭牵引力控制和车身稳定
    FullyOff,
}

/// 控制请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRequest {
    /// 顶灯开关（已处于目标状态时不发送任何帧）
    DomeLight { on: bool },
    /// 座椅加热目标档位
    SeatHeater { level: HeaterLevel },
    /// 车窗升降
    Window {
        windows: WindowMask,
        motion: WindowMotion,
    },
    TractionControl { mode: TractionMode },
    /// 提示音
    Chime,
    /// 仪表盘提示信息
    ClusterMessage { code: u16 },
}

impl CommandRequest {
    pub fn kind(&self) -> CommandKind {
        match self {
            CommandRequest::DomeLight { .. } => CommandKind::DomeLight,
            CommandRequest::SeatHeater { .. } => CommandKind::SeatHeater,
            CommandRequest::Window { .. } => CommandKind::Window,
            CommandRequest::TractionControl { .. } => CommandKind::TractionControl,
            CommandRequest::Chime => CommandKind::Chime,
            CommandRequest::ClusterMessage { .. } => CommandKind::ClusterMessage,
        }
    }
}

/// 命令阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// 已创建，下一个 tick 发出第一帧
    Idle,
    /// 第 `step` 帧已发出，等待 `deadline`
    Armed { step: u32, deadline: Instant },
    /// 已完成（或已放弃），等待移除
    Complete,
}

/// 按键两段式进度（按下 → 松开）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ButtonStage {
    Pending,
    Pressed,
}

/// 命令的步骤程序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Program {
    /// `pressed_for`：最近一次发出的按下所服务的目标（顶灯按键是切换式的）
    DomeLight {
        on: bool,
        stage: ButtonStage,
        pressed_for: Option<bool>,
    },
    SeatHeater { target: HeaterLevel, button_down: bool },
    Window { command: WindowCommand, started_at: Option<Instant> },
    TractionControl { mode: TractionMode, stage: ButtonStage },
    Chime { stage: ButtonStage },
    ClusterMessage { code: u16 },
}

/// 单个步骤：要发出的帧，以及发出后的休眠时长（`None` 表示最后一帧）
#[derive(Debug, Clone, Copy)]
struct Step {
    frame: RawFrame,
    hold: Option<Duration>,
}

/// 计算步骤所需的上下文（只在 tick 上下文中构造）
pub(crate) struct StepContext<'a> {
    pub now: Instant,
    pub state: &'a VehicleState,
    pub timing: &'a SchedulerConfig,
    /// 调度器跟踪的座椅加热档位，每成功发出一次按下帧前进一档
    pub heater_level: &'a mut HeaterLevel,
}

impl Program {
    fn from_request(request: CommandRequest) -> Self {
        match request {
            CommandRequest::DomeLight { on } => Program::DomeLight {
                on,
                stage: ButtonStage::Pending,
                pressed_for: None,
            },
            CommandRequest::SeatHeater { level } => Program::SeatHeater {
                target: level,
                button_down: false,
            },
            CommandRequest::Window { windows, motion } => Program::Window {
                command: WindowCommand::new(windows, motion),
                started_at: None,
            },
            CommandRequest::TractionControl { mode } => Program::TractionControl {
                mode,
                stage: ButtonStage::Pending,
            },
            CommandRequest::Chime => Program::Chime {
                stage: ButtonStage::Pending,
            },
            CommandRequest::ClusterMessage { code } => Program::ClusterMessage { code },
        }
    }

    /// 下一步；`None` 表示没有剩余步骤
    fn next_step(&self, ctx: &StepContext<'_>) -> Option<Step> {
        let timing = ctx.timing;
        match *self {
            Program::DomeLight {
                on,
                stage,
                pressed_for,
            } => {
                // 第一次按下之前以解码状态为准，之后以已发出的切换结果为准
                let lit = pressed_for.unwrap_or_else(|| ctx.state.is_dome_light_on());
                match stage {
                    ButtonStage::Pending if lit == on => None,
                    ButtonStage::Pending => Some(Step {
                        frame: DomeLightButton::new(ButtonAction::Press).to_frame(),
                        hold: Some(timing.button_press()),
                    }),
                    // 按下期间目标被改写：松开后间隔一段时间再切换一次
                    ButtonStage::Pressed => Some(Step {
                        frame: DomeLightButton::new(ButtonAction::Release).to_frame(),
                        hold: (pressed_for != Some(on)).then(|| timing.button_gap()),
                    }),
                }
            },
            Program::SeatHeater {
                target,
                button_down,
            } => {
                if button_down {
                    // 松开后如果还没到目标档位，间隔一段时间再按
                    let hold = (*ctx.heater_level != target).then(|| timing.button_gap());
                    Some(Step {
                        frame: SeatHeaterButton::new(ButtonAction::Release).to_frame(),
                        hold,
                    })
                } else if *ctx.heater_level == target {
                    None
                } else {
                    Some(Step {
                        frame: SeatHeaterButton::new(ButtonAction::Press).to_frame(),
                        hold: Some(timing.button_press()),
                    })
                }
            },
            Program::Window {
                command,
                started_at,
            } => {
                let started = started_at.unwrap_or(ctx.now);
                if ctx.now.saturating_duration_since(started) >= timing.window_duration() {
                    Some(Step {
                        frame: WindowCommand::neutral().to_frame(),
                        hold: None,
                    })
                } else {
                    Some(Step {
                        frame: command.to_frame(),
                        hold: Some(timing.window_frame_interval()),
                    })
                }
            },
            Program::TractionControl { mode, stage } => match stage {
                ButtonStage::Pending => Some(Step {
                    frame: TractionControlButton::new(ButtonAction::Press).to_frame(),
                    hold: Some(match mode {
                        TractionMode::Toggle => timing.traction_tap(),
                        TractionMode::FullyOff => timing.traction_hold(),
                    }),
                }),
                ButtonStage::Pressed => Some(Step {
                    frame: TractionControlButton::new(ButtonAction::Release).to_frame(),
                    hold: None,
                }),
            },
            Program::Chime { stage } => match stage {
                ButtonStage::Pending => Some(Step {
                    frame: ChimeCommand::start().to_frame(),
                    hold: Some(timing.chime_hold()),
                }),
                ButtonStage::Pressed => Some(Step {
                    frame: ChimeCommand::stop().to_frame(),
                    hold: None,
                }),
            },
            Program::ClusterMessage { code } => Some(Step {
                frame: ClusterMessageCommand::new(code).to_frame(),
                hold: None,
            }),
        }
    }

    /// 步骤的帧成功发出后推进进度
    fn on_sent(&mut self, ctx: &mut StepContext<'_>) {
        match self {
            Program::DomeLight {
                on,
                stage,
                pressed_for,
            } => match *stage {
                ButtonStage::Pending => {
                    *stage = ButtonStage::Pressed;
                    *pressed_for = Some(*on);
                },
                ButtonStage::Pressed => *stage = ButtonStage::Pending,
            },
            Program::TractionControl { stage, .. } | Program::Chime { stage } => {
                *stage = ButtonStage::Pressed
            },
            Program::SeatHeater { button_down, .. } => {
                if !*button_down {
                    *ctx.heater_level = ctx.heater_level.next();
                }
                *button_down = !*button_down;
            },
            Program::Window { started_at, .. } => {
                started_at.get_or_insert(ctx.now);
            },
            Program::ClusterMessage { .. } => {},
        }
    }
}

/// 单次推进的结果
#[derive(Debug)]
pub(crate) enum StepOutcome {
    /// 截止时间未到
    Waiting,
    /// 发出一帧，进入下一个等待
    Sent(RawFrame),
    /// 命令完成（可能附带最后一帧）
    Completed(Option<RawFrame>),
    /// 发送失败，剩余步骤被放弃
    Failed(CanError),
}

/// 正在执行的定时命令
#[derive(Debug, Clone)]
pub struct ScheduledCommand {
    kind: CommandKind,
    program: Program,
    phase: Phase,
    steps_sent: u32,
}

impl ScheduledCommand {
    pub(crate) fn new(request: CommandRequest) -> Self {
        Self {
            kind: request.kind(),
            program: Program::from_request(request),
            phase: Phase::Idle,
            steps_sent: 0,
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// 已发出的帧数
    pub fn steps_sent(&self) -> u32 {
        self.steps_sent
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// 用同种类的新请求替换尚未发出的步骤
    ///
    /// 已发出的帧不能撤回：按下的按键仍然会被松开，跟踪的座椅加热档位也不会回退。
    /// 顶灯在按下期间被改写目标时，松开后会再补一次按键。
    pub(crate) fn supersede(&mut self, request: CommandRequest) {
        debug_assert_eq!(self.kind, request.kind());
        match (&mut self.program, request) {
            (Program::DomeLight { on, .. }, CommandRequest::DomeLight { on: new }) => *on = new,
            (Program::SeatHeater { target, .. }, CommandRequest::SeatHeater { level }) => {
                *target = level
            },
            (
                Program::Window {
                    command,
                    started_at,
                },
                CommandRequest::Window { windows, motion },
            ) => {
                // 车窗以新的方向重新计时，下一个 tick 立即发出
                *command = WindowCommand::new(windows, motion);
                *started_at = None;
                if matches!(self.phase, Phase::Armed { .. }) {
                    self.phase = Phase::Idle;
                }
            },
            (
                Program::TractionControl { mode, .. },
                CommandRequest::TractionControl { mode: new },
            ) => *mode = new,
            (Program::ClusterMessage { code }, CommandRequest::ClusterMessage { code: new }) => {
                *code = new
            },
            _ => {},
        }
    }

    /// 最多推进一步
    pub(crate) fn advance<T: TxAdapter + ?Sized>(
        &mut self,
        ctx: &mut StepContext<'_>,
        tx: &mut T,
    ) -> StepOutcome {
        match self.phase {
            Phase::Complete => return StepOutcome::Completed(None),
            Phase::Armed { deadline, .. } if ctx.now < deadline => return StepOutcome::Waiting,
            _ => {},
        }

        let Some(step) = self.program.next_step(ctx) else {
            self.phase = Phase::Complete;
            return StepOutcome::Completed(None);
        };

        if let Err(e) = tx.send(step.frame) {
            self.phase = Phase::Complete;
            return StepOutcome::Failed(e);
        }

        self.program.on_sent(ctx);
        self.steps_sent += 1;

        match step.hold {
            Some(hold) => {
                self.phase = Phase::Armed {
                    step: self.steps_sent,
                    deadline: ctx.now + hold,
                };
                StepOutcome::Sent(step.frame)
            },
            None => {
                self.phase = Phase::Complete;
                StepOutcome::Completed(Some(step.frame))
            },
        }
    }
}
