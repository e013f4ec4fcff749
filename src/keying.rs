use crate::types::{KeyEvent, KeyState, SignalLevel};

/// RMS レベルからキーの押下/解放を決める状態機械
///
/// 固定閾値との比較だけで判定するエッジトリガ方式。
/// 閾値をまたいだときだけイベントを返し、同じ側にいる間は何も返さない。
///
/// ヒステリシスやデバウンスは持たないため、閾値付近でレベルが
/// 振動するとその分だけキーもチャタリングする。
///
/// # Examples
///
/// ```
/// # use sidetone_keyer::keying::KeyStateMachine;
/// # use sidetone_keyer::types::{KeyEvent, KeyState};
/// let mut machine = KeyStateMachine::new(50.0);
///
/// assert_eq!(machine.update(60.0), Some(KeyEvent::KeyDown));
/// assert_eq!(machine.update(70.0), None);
/// assert_eq!(machine.update(10.0), Some(KeyEvent::KeyUp));
/// assert_eq!(machine.state(), KeyState::Released);
/// ```
#[derive(Debug)]
pub struct KeyStateMachine {
    threshold: SignalLevel,
    state: KeyState,
}

impl KeyStateMachine {
    pub fn new(threshold: SignalLevel) -> Self {
        Self {
            threshold,
            state: KeyState::Released,
        }
    }

    /// 1フレーム分のレベルを評価する
    ///
    /// # Returns
    /// * `Some(KeyEvent)` - 閾値をまたいだ
    /// * `None` - 状態に変化なし
    pub fn update(&mut self, level: SignalLevel) -> Option<KeyEvent> {
        let above = level > self.threshold;

        match (self.state, above) {
            (KeyState::Released, true) => {
                self.state = KeyState::Pressed;
                Some(KeyEvent::KeyDown)
            }
            (KeyState::Pressed, false) => {
                self.state = KeyState::Released;
                Some(KeyEvent::KeyUp)
            }
            _ => None,
        }
    }

    /// 停止時にキーを強制的に離す
    ///
    /// 押下中だった場合のみ `KeyUp` を返す。
    pub fn force_release(&mut self) -> Option<KeyEvent> {
        match self.state {
            KeyState::Pressed => {
                self.state = KeyState::Released;
                Some(KeyEvent::KeyUp)
            }
            KeyState::Released => None,
        }
    }

    pub fn state(&self) -> KeyState {
        self.state
    }

    pub fn threshold(&self) -> SignalLevel {
        self.threshold
    }
}

/// キーイング表示用の1文字
///
/// `/` 押下開始、`X` 押下継続、`\` 押下終了、`.` 無音
pub fn keying_mark(event: Option<KeyEvent>, state: KeyState) -> char {
    match (event, state) {
        (Some(KeyEvent::KeyDown), _) => '/',
        (Some(KeyEvent::KeyUp), _) => '\\',
        (None, KeyState::Pressed) => 'X',
        (None, KeyState::Released) => '.',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// レベル列を流して (インデックス, イベント) を集める
    fn run(machine: &mut KeyStateMachine, levels: &[f64]) -> Vec<(usize, KeyEvent)> {
        levels
            .iter()
            .enumerate()
            .filter_map(|(i, &level)| machine.update(level).map(|e| (i, e)))
            .collect()
    }

    #[test]
    fn test_initial_state() {
        let machine = KeyStateMachine::new(50.0);
        assert_eq!(machine.state(), KeyState::Released);
        assert_eq!(machine.threshold(), 50.0);
    }

    #[test]
    fn test_reference_sequence() {
        let mut machine = KeyStateMachine::new(50.0);
        let events = run(&mut machine, &[10.0, 10.0, 60.0, 60.0, 10.0, 60.0]);

        assert_eq!(
            events,
            vec![
                (2, KeyEvent::KeyDown),
                (4, KeyEvent::KeyUp),
                (5, KeyEvent::KeyDown),
            ]
        );
        assert_eq!(machine.state(), KeyState::Pressed);
    }

    #[test]
    fn test_constant_above_threshold() {
        for n in [1usize, 2, 17, 1000] {
            let mut machine = KeyStateMachine::new(50.0);
            let events = run(&mut machine, &vec![300.0; n]);
            assert_eq!(events, vec![(0, KeyEvent::KeyDown)]);
            assert_eq!(machine.state(), KeyState::Pressed);
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // ちょうど閾値は「押していない」
        let mut machine = KeyStateMachine::new(50.0);
        assert_eq!(machine.update(50.0), None);
        assert_eq!(machine.update(50.1), Some(KeyEvent::KeyDown));
        assert_eq!(machine.update(50.0), Some(KeyEvent::KeyUp));
    }

    #[test]
    fn test_events_match_crossings() {
        let threshold = 50.0;
        // 疑似乱数でレベル列を作る
        let mut x: u32 = 12345;
        let levels: Vec<f64> = (0..5000)
            .map(|_| {
                x = x.wrapping_mul(1103515245).wrapping_add(12345);
                ((x >> 16) % 100) as f64
            })
            .collect();

        let mut machine = KeyStateMachine::new(threshold);
        let events = run(&mut machine, &levels);

        let mut rising = 0;
        let mut falling = 0;
        let mut prev = 0.0;
        for &level in &levels {
            if prev <= threshold && level > threshold {
                rising += 1;
            }
            if prev > threshold && level <= threshold {
                falling += 1;
            }
            prev = level;
        }

        let downs = events.iter().filter(|(_, e)| *e == KeyEvent::KeyDown).count();
        let ups = events.iter().filter(|(_, e)| *e == KeyEvent::KeyUp).count();
        assert_eq!(downs, rising);
        assert_eq!(ups, falling);

        // イベントは必ず交互に来る
        for pair in events.windows(2) {
            assert_ne!(pair[0].1, pair[1].1);
        }
    }

    #[test]
    fn test_no_hysteresis() {
        let mut machine = KeyStateMachine::new(50.0);
        let events = run(&mut machine, &[51.0, 49.0, 51.0, 49.0]);
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn test_force_release() {
        let mut machine = KeyStateMachine::new(50.0);
        assert_eq!(machine.force_release(), None);

        machine.update(80.0);
        assert_eq!(machine.force_release(), Some(KeyEvent::KeyUp));
        assert_eq!(machine.state(), KeyState::Released);
        assert_eq!(machine.force_release(), None);
    }

    #[test]
    fn test_keying_mark() {
        let mut machine = KeyStateMachine::new(50.0);
        let marks: String = [10.0, 60.0, 60.0, 10.0, 10.0]
            .iter()
            .map(|&level| {
                let event = machine.update(level);
                keying_mark(event, machine.state())
            })
            .collect();
        assert_eq!(marks, "./X\\.");
    }
}
