//! 协作式命令调度器
//!
//! 在 tick 上下文中运行，从不阻塞。每个 tick 按注册顺序把每个活动命令最多推进一步；
//! 本 tick 要发出的帧在 `tick_at()` 返回前全部交给传输层。
//!
//! 同一 [`CommandKind`] 同时只有一个实例：重复请求会更新活动实例尚未发出的步骤，
//! 而不是再创建一个实例。

use crate::command::{
    CommandKind, CommandRequest, FrameBuffer, ScheduledCommand, StepContext, StepOutcome,
};
use crate::config::SchedulerConfig;
use crate::hooks::HookManager;
use crate::metrics::BusMetrics;
use crate::state::VehicleState;
use carbus_can::TxAdapter;
use carbus_protocol::HeaterLevel;
use std::sync::atomic::Ordering;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, error, trace};

/// 单次调度的统计
#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    /// 本 tick 成功发出的帧（按发送顺序）
    pub sent: FrameBuffer,
    /// 本 tick 完成并移除的命令数
    pub completed: usize,
    /// 本 tick 因发送失败放弃的命令数
    pub abandoned: usize,
}

/// 命令调度器
pub struct CommandScheduler {
    /// 活动命令（注册顺序）
    commands: Vec<ScheduledCommand>,
    timing: SchedulerConfig,
    /// 座椅加热的当前档位（车上没有反馈，只能靠记录发出的按键推算）
    heater_level: HeaterLevel,
    metrics: Arc<BusMetrics>,
    hooks: Arc<RwLock<HookManager>>,
}

impl CommandScheduler {
    pub fn new(
        timing: SchedulerConfig,
        metrics: Arc<BusMetrics>,
        hooks: Arc<RwLock<HookManager>>,
    ) -> Self {
        Self {
            commands: Vec::new(),
            timing,
            heater_level: HeaterLevel::Off,
            metrics,
            hooks,
        }
    }

    /// 提交控制请求
    ///
    /// 返回 `false` 表示请求无效（例如车窗掩码为空）。没有进行中的同种命令、
    /// 且目标已经达成的请求（座椅加热已在目标档位，顶灯已处于目标状态）
    /// 返回 `true`，但不会调度任何帧。
    pub fn request(&mut self, request: CommandRequest, state: &VehicleState) -> bool {
        let kind = request.kind();

        if let CommandRequest::Window { windows, .. } = request
            && windows.is_empty()
        {
            debug!("rejecting window request with empty mask");
            return false;
        }

        if let Some(active) = self.commands.iter_mut().find(|c| c.kind() == kind) {
            active.supersede(request);
            self.metrics
                .commands_superseded
                .fetch_add(1, Ordering::Relaxed);
            debug!("{:?} superseded by {:?}", kind, request);
            return true;
        }

        match request {
            CommandRequest::SeatHeater { level } => {
                let presses = self.heater_level.presses_to(level);
                if presses == 0 {
                    debug!("seat heater already at {:?}", level);
                    return true;
                }
                debug!(
                    "seat heater {:?} -> {:?}: {} press(es)",
                    self.heater_level, level, presses
                );
            },
            CommandRequest::DomeLight { on } if state.is_dome_light_on() == on => {
                debug!("dome light already {}", if on { "on" } else { "off" });
                return true;
            },
            _ => {},
        }

        debug!("scheduling {:?}", request);
        self.commands.push(ScheduledCommand::new(request));
        true
    }

    /// 以当前时间调度一次
    pub fn tick<T: TxAdapter + ?Sized>(
        &mut self,
        state: &VehicleState,
        tx: &mut T,
    ) -> ScheduleReport {
        self.tick_at(Instant::now(), state, tx)
    }

    /// 以给定时间调度一次：每个活动命令最多推进一步，完成或失败的命令被移除
    pub fn tick_at<T: TxAdapter + ?Sized>(
        &mut self,
        now: Instant,
        state: &VehicleState,
        tx: &mut T,
    ) -> ScheduleReport {
        let mut report = ScheduleReport::default();
        if self.commands.is_empty() {
            return report;
        }

        let mut ctx = StepContext {
            now,
            state,
            timing: &self.timing,
            heater_level: &mut self.heater_level,
        };

        for command in self.commands.iter_mut() {
            let sent = match command.advance(&mut ctx, tx) {
                StepOutcome::Waiting => None,
                StepOutcome::Sent(frame) => {
                    trace!(
                        "{:?} step {} sent: {}",
                        command.kind(),
                        command.steps_sent(),
                        frame
                    );
                    Some(frame)
                },
                StepOutcome::Completed(frame) => {
                    report.completed += 1;
                    self.metrics.commands_completed.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "{:?} complete after {} frame(s)",
                        command.kind(),
                        command.steps_sent()
                    );
                    frame
                },
                StepOutcome::Failed(e) => {
                    report.abandoned += 1;
                    self.metrics.tx_failures.fetch_add(1, Ordering::Relaxed);
                    self.metrics.commands_abandoned.fetch_add(1, Ordering::Relaxed);
                    error!(
                        "{:?}: send failed after {} frame(s), abandoning: {}",
                        command.kind(),
                        command.steps_sent(),
                        e
                    );
                    None
                },
            };

            if let Some(frame) = sent {
                self.metrics.tx_frames.fetch_add(1, Ordering::Relaxed);
                if let Ok(hooks) = self.hooks.read() {
                    hooks.trigger_all_sent(&frame);
                }
                report.sent.push(frame);
            }
        }

        self.commands.retain(|c| !c.is_complete());
        report
    }

    /// 活动命令（注册顺序）
    pub fn active(&self) -> &[ScheduledCommand] {
        &self.commands
    }

    pub fn is_active(&self, kind: CommandKind) -> bool {
        self.commands.iter().any(|c| c.kind() == kind)
    }

    pub fn is_idle(&self) -> bool {
        self.commands.is_empty()
    }

    /// 调度器跟踪的座椅加热档位
    pub fn heater_level(&self) -> HeaterLevel {
        self.heater_level
    }

    /// 丢弃所有活动命令（已按下的按键不会再被松开）
    pub fn clear(&mut self) {
        if !self.commands.is_empty() {
            debug!("dropping {} active command(s)", self.commands.len());
        }
        self.commands.clear();
    }

    pub fn timing(&self) -> &SchedulerConfig {
        &self.timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Phase, TractionMode};
    use carbus_can::{MockCanAdapter, MockTxAdapter, SplittableAdapter};
    use carbus_protocol::{
        DoorMask, ID_DOME_LIGHT_BUTTON, ID_SEAT_HEATER_BUTTON, ID_WINDOW_CONTROL, RawFrame,
        WindowMotion,
    };
    use std::time::Duration;

    fn scheduler_with(
        timing: SchedulerConfig,
    ) -> (CommandScheduler, MockCanAdapter, MockTxAdapter, Arc<BusMetrics>) {
        let metrics = Arc::new(BusMetrics::new());
        let scheduler = CommandScheduler::new(
            timing,
            metrics.clone(),
            Arc::new(RwLock::new(HookManager::new())),
        );
        let bus = MockCanAdapter::new();
        let (_rx, tx) = bus.clone().split().unwrap();
        (scheduler, bus, tx, metrics)
    }

    fn scheduler() -> (CommandScheduler, MockCanAdapter, MockTxAdapter, Arc<BusMetrics>) {
        scheduler_with(SchedulerConfig::default())
    }

    /// 以固定步长 tick 直到调度器空闲，返回发出的全部帧
    fn run_to_idle(
        scheduler: &mut CommandScheduler,
        tx: &mut MockTxAdapter,
        start: Instant,
        step: Duration,
    ) -> Vec<RawFrame> {
        let state = VehicleState::default();
        let mut frames = Vec::new();
        let mut now = start;
        for _ in 0..1000 {
            frames.extend(scheduler.tick_at(now, &state, tx).sent);
            if scheduler.is_idle() {
                return frames;
            }
            now += step;
        }
        panic!("scheduler did not go idle");
    }

    #[test]
    fn test_duplicate_request_updates_in_place() {
        let (mut scheduler, _bus, _tx, metrics) = scheduler();
        let state = VehicleState::default();

        assert!(scheduler.request(
            CommandRequest::SeatHeater {
                level: HeaterLevel::High,
            },
            &state,
        ));
        assert!(scheduler.request(
            CommandRequest::SeatHeater {
                level: HeaterLevel::Low,
            },
            &state,
        ));

        assert_eq!(scheduler.active().len(), 1);
        assert_eq!(metrics.snapshot().commands_superseded, 1);
    }

    #[test]
    fn test_seat_heater_high_to_low_is_two_presses() {
        let (mut scheduler, bus, mut tx, _) = scheduler();
        let state = VehicleState::default();
        let start = Instant::now();
        let step = Duration::from_millis(50);

        scheduler.request(
            CommandRequest::SeatHeater {
                level: HeaterLevel::High,
            },
            &state,
        );
        run_to_idle(&mut scheduler, &mut tx, start, step);
        assert_eq!(scheduler.heater_level(), HeaterLevel::High);
        bus.take_sent_frames();

        scheduler.request(
            CommandRequest::SeatHeater {
                level: HeaterLevel::Low,
            },
            &state,
        );
        let frames = run_to_idle(&mut scheduler, &mut tx, start + Duration::from_secs(5), step);

        let presses = frames
            .iter()
            .filter(|f| f.id == ID_SEAT_HEATER_BUTTON && f.data_slice() == [0xD0])
            .count();
        assert_eq!(presses, 2);
        assert_eq!(frames.len(), 4);
        assert_eq!(scheduler.heater_level(), HeaterLevel::Low);
    }

    #[test]
    fn test_seat_heater_at_target_schedules_nothing() {
        let (mut scheduler, bus, mut tx, _) = scheduler();
        let state = VehicleState::default();
        assert!(scheduler.request(
            CommandRequest::SeatHeater {
                level: HeaterLevel::Off,
            },
            &state,
        ));
        assert!(scheduler.is_idle());

        scheduler.tick_at(Instant::now(), &state, &mut tx);
        assert!(bus.sent_frames().is_empty());
    }

    #[test]
    fn test_dome_light_in_requested_state_schedules_nothing() {
        let (mut scheduler, _bus, _tx, metrics) = scheduler();

        // 默认状态亮度为 0，即关闭
        let state = VehicleState::default();
        assert!(scheduler.request(CommandRequest::DomeLight { on: false }, &state));
        assert!(scheduler.is_idle());
        assert_eq!(metrics.snapshot().commands_completed, 0);
    }

    #[test]
    fn test_dome_light_retargeted_while_pressed_toggles_again() {
        let (mut scheduler, bus, mut tx, _) = scheduler();
        let state = VehicleState::default();
        let t0 = Instant::now();

        assert!(scheduler.request(CommandRequest::DomeLight { on: true }, &state));
        assert_eq!(scheduler.tick_at(t0, &state, &mut tx).sent.len(), 1);

        // 按下已经发出后改为关灯
        assert!(scheduler.request(CommandRequest::DomeLight { on: false }, &state));

        let mut sent_at = vec![t0];
        let mut now = t0;
        while !scheduler.is_idle() {
            now += Duration::from_millis(10);
            if !scheduler.tick_at(now, &state, &mut tx).sent.is_empty() {
                sent_at.push(now);
            }
            assert!(now < t0 + Duration::from_secs(5), "dome light never finished");
        }

        let frames = bus.sent_frames();
        let payloads: Vec<Vec<u8>> = frames.iter().map(|f| f.data_slice().to_vec()).collect();
        assert!(frames.iter().all(|f| f.id == ID_DOME_LIGHT_BUTTON));
        assert_eq!(
            payloads,
            vec![vec![0xF1, 0xFF], vec![0xF0, 0xFF], vec![0xF1, 0xFF], vec![0xF0, 0xFF]]
        );

        // 松开和第二次按下之间隔开 button_gap
        let gap = scheduler.timing().button_gap();
        assert!(sent_at[2].duration_since(sent_at[1]) >= gap);
    }

    #[test]
    fn test_dome_light_retargeted_back_needs_single_toggle() {
        let (mut scheduler, _bus, mut tx, _) = scheduler();
        let state = VehicleState::default();

        scheduler.request(CommandRequest::DomeLight { on: true }, &state);
        scheduler.tick_at(Instant::now(), &state, &mut tx);
        scheduler.request(CommandRequest::DomeLight { on: false }, &state);
        scheduler.request(CommandRequest::DomeLight { on: true }, &state);

        let start = Instant::now() + Duration::from_millis(200);
        let frames = run_to_idle(&mut scheduler, &mut tx, start, Duration::from_millis(10));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data_slice(), &[0xF0, 0xFF]);
    }

    #[test]
    fn test_three_step_window_emits_three_frames() {
        let timing = SchedulerConfig {
            window_frame_interval_ms: 100,
            window_duration_ms: 200,
            ..SchedulerConfig::default()
        };
        let (mut scheduler, bus, mut tx, metrics) = scheduler_with(timing);
        let state = VehicleState::default();
        let t0 = Instant::now();
        let at = |ms| t0 + Duration::from_millis(ms);

        assert!(scheduler.request(
            CommandRequest::Window {
                windows: DoorMask::DRIVER_FRONT,
                motion: WindowMotion::RollDown,
            },
            &state,
        ));

        assert_eq!(scheduler.tick_at(t0, &state, &mut tx).sent.len(), 1);
        // 截止时间之前的 tick 不发送
        assert!(scheduler.tick_at(at(50), &state, &mut tx).sent.is_empty());
        assert_eq!(scheduler.tick_at(at(100), &state, &mut tx).sent.len(), 1);

        let last = scheduler.tick_at(at(200), &state, &mut tx);
        assert_eq!(last.sent.len(), 1);
        assert_eq!(last.completed, 1);
        assert!(scheduler.is_idle());

        let frames = bus.sent_frames();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.id == ID_WINDOW_CONTROL));
        assert_eq!(frames[0].data_slice(), &[0xC2, 0xC0, 0xFF]);
        assert_eq!(frames[2].data_slice(), &[0xC0, 0xC0, 0xFF]);
        assert_eq!(metrics.snapshot().tx_frames, 3);
        assert_eq!(metrics.snapshot().commands_completed, 1);
    }

    #[test]
    fn test_window_supersede_restarts_with_new_bits() {
        let (mut scheduler, bus, mut tx, _) = scheduler();
        let state = VehicleState::default();
        let t0 = Instant::now();

        scheduler.request(
            CommandRequest::Window {
                windows: DoorMask::ALL,
                motion: WindowMotion::RollDown,
            },
            &state,
        );
        scheduler.tick_at(t0, &state, &mut tx);

        scheduler.request(
            CommandRequest::Window {
                windows: DoorMask::ALL,
                motion: WindowMotion::RollUp,
            },
            &state,
        );
        assert_eq!(scheduler.active()[0].phase(), Phase::Idle);

        // 不必等待上一个截止时间
        let report = scheduler.tick_at(t0 + Duration::from_millis(10), &state, &mut tx);
        assert_eq!(report.sent[0].data_slice(), &[0xE4, 0xE4, 0xFF]);
        assert_eq!(bus.sent_frames().len(), 2);
    }

    #[test]
    fn test_empty_window_mask_rejected() {
        let (mut scheduler, _, _, _) = scheduler();
        assert!(!scheduler.request(
            CommandRequest::Window {
                windows: DoorMask::NONE,
                motion: WindowMotion::RollUp,
            },
            &VehicleState::default(),
        ));
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_commands_tick_in_registration_order() {
        let (mut scheduler, _, mut tx, _) = scheduler();
        let state = VehicleState::default();
        scheduler.request(CommandRequest::ClusterMessage { code: 0x0001 }, &state);
        scheduler.request(CommandRequest::Chime, &state);
        scheduler.request(
            CommandRequest::TractionControl {
                mode: TractionMode::Toggle,
            },
            &state,
        );

        let kinds: Vec<CommandKind> = scheduler.active().iter().map(|c| c.kind()).collect();
        assert_eq!(
            kinds,
            [CommandKind::ClusterMessage, CommandKind::Chime, CommandKind::TractionControl]
        );

        let report = scheduler.tick_at(Instant::now(), &state, &mut tx);
        let ids: Vec<u32> = report.sent.iter().map(|f| f.id).collect();
        assert_eq!(ids, [0x338, 0x24B, 0x316]);
        // 单帧的仪表信息已完成
        assert_eq!(report.completed, 1);
        assert!(!scheduler.is_active(CommandKind::ClusterMessage));
    }

    #[test]
    fn test_send_failure_abandons_remaining_steps() {
        let (mut scheduler, bus, mut tx, metrics) = scheduler();
        let state = VehicleState::default();
        let t0 = Instant::now();

        scheduler.request(CommandRequest::DomeLight { on: true }, &state);
        assert_eq!(scheduler.tick_at(t0, &state, &mut tx).sent.len(), 1);

        bus.fail_next_sends(1);
        let report = scheduler.tick_at(t0 + Duration::from_millis(200), &state, &mut tx);
        assert_eq!(report.abandoned, 1);
        assert!(scheduler.is_idle());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tx_failures, 1);
        assert_eq!(snapshot.commands_abandoned, 1);
        assert_eq!(snapshot.tx_frames, 1);
    }

    #[test]
    fn test_failed_press_does_not_advance_heater_level() {
        let (mut scheduler, bus, mut tx, _) = scheduler();
        let state = VehicleState::default();
        bus.fail_next_sends(1);

        scheduler.request(
            CommandRequest::SeatHeater {
                level: HeaterLevel::High,
            },
            &state,
        );
        scheduler.tick_at(Instant::now(), &state, &mut tx);

        assert!(scheduler.is_idle());
        assert_eq!(scheduler.heater_level(), HeaterLevel::Off);
    }
}
