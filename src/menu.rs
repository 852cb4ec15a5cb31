//! Conversation menu: an explicit per-user state machine over reply-keyboard
//! button texts.
//!
//! Which buttons a user can press next is whatever keyboard was last shown,
//! but the dispatch never relies on that: the current state is persisted in
//! the goal store and every transition is keyed on (state, input text), so
//! there are no overlapping handlers to order.

use chrono::Local;
use teloxide::types::{KeyboardButton, KeyboardMarkup};

use crate::store::GoalStore;

const BTN_ACCOUNT: &str = "Личный Кабинет";
const BTN_GOALS: &str = "Мои цели";
const BTN_DONE: &str = "ГОТОВО";
const BTN_NEXT_TIME: &str = "В СЛЕДУЮЩИЙ РАЗ";
const BTN_BACK: &str = "Назад";

const GREETING: &str = "Привет, Астах! Я твой личный бот-помощник.";
const CHOOSE_GOAL: &str = "Выбери цель:";
const NEXT_TIME: &str = "Ничего, в следующий раз получится! 👍";
const HOW_CAN_I_HELP: &str = "Чем могу помочь?";
const DID_NOT_UNDERSTAND: &str = "Я не понял. Выбери кнопку на клавиатуре 🙂";

/// Where the conversation currently is. Persisted per user in the goal store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    MainMenu,
    GoalsMenu,
    PullupsPrompt,
    PushupsPrompt,
}

impl MenuState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MenuState::MainMenu => "main_menu",
            MenuState::GoalsMenu => "goals_menu",
            MenuState::PullupsPrompt => "pullups_prompt",
            MenuState::PushupsPrompt => "pushups_prompt",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "goals_menu" => MenuState::GoalsMenu,
            "pullups_prompt" => MenuState::PullupsPrompt,
            "pushups_prompt" => MenuState::PushupsPrompt,
            _ => MenuState::MainMenu,
        }
    }
}

/// Outbound reply: text plus the keyboard describing the next valid inputs.
pub struct Reply {
    pub text: String,
    pub keyboard: KeyboardMarkup,
}

fn keyboard(rows: Vec<Vec<&str>>) -> KeyboardMarkup {
    KeyboardMarkup::new(
        rows.into_iter()
            .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>()),
    )
    .resize_keyboard()
}

fn main_keyboard() -> KeyboardMarkup {
    keyboard(vec![vec![BTN_ACCOUNT, BTN_GOALS]])
}

/// Goal buttons carry the live targets, e.g. "Подтягивания 5"; dispatch is by
/// prefix so the label can change as targets grow.
fn goals_keyboard(pushups: i64, pullups: i64) -> KeyboardMarkup {
    let pushups_btn = format!("Отжимания {}", pushups);
    let pullups_btn = format!("Подтягивания {}", pullups);
    keyboard(vec![vec![pushups_btn.as_str(), pullups_btn.as_str(), BTN_BACK]])
}

fn prompt_keyboard() -> KeyboardMarkup {
    keyboard(vec![vec![BTN_DONE, BTN_NEXT_TIME], vec![BTN_BACK]])
}

fn pullups_prompt(target: i64) -> String {
    format!(
        "{target} Чистых подтягиваний - {target} баллов (Папа должен проверить и подтвердить!)"
    )
}

fn pushups_prompt(target: i64) -> String {
    format!(
        "{target} Чистых отжиманий - {target} баллов (Папа должен проверить и подтвердить!)"
    )
}

fn congrats(points: i64) -> String {
    format!("Поздравляю, ты сделал это и заработал {points} баллов! 🌟")
}

/// Keyboard matching the user's current state, used when re-prompting.
fn keyboard_for(store: &GoalStore, user_id: i64, state: MenuState) -> rusqlite::Result<KeyboardMarkup> {
    Ok(match state {
        MenuState::MainMenu => main_keyboard(),
        MenuState::GoalsMenu => goals_keyboard(
            store.get_current_pushups(user_id)?,
            store.get_current_pullups(user_id)?,
        ),
        MenuState::PullupsPrompt | MenuState::PushupsPrompt => prompt_keyboard(),
    })
}

/// Handle one inbound text message: read/write the store, transition the
/// persisted state, and produce the reply.
///
/// All store writes complete before this returns, so the caller's success
/// reply is only ever sent after the awards are durable.
pub fn respond(store: &GoalStore, user_id: i64, text: &str) -> rusqlite::Result<Reply> {
    let text = text.trim();

    // Commands and "Назад" reset to the main menu from any state.
    if text == "/start" || text.starts_with("/start ") {
        store.set_menu_state(user_id, MenuState::MainMenu)?;
        return Ok(Reply { text: GREETING.to_string(), keyboard: main_keyboard() });
    }
    if text == BTN_BACK {
        store.set_menu_state(user_id, MenuState::MainMenu)?;
        return Ok(Reply { text: HOW_CAN_I_HELP.to_string(), keyboard: main_keyboard() });
    }

    let state = store.menu_state(user_id)?;
    match state {
        MenuState::MainMenu if text == BTN_ACCOUNT => {
            let points = store.get_points(user_id)?;
            let now = Local::now().format("%Y-%m-%d %H:%M:%S");
            Ok(Reply {
                text: format!("У тебя {points} баллов!\nдата и время: {now}"),
                keyboard: main_keyboard(),
            })
        }
        MenuState::MainMenu if text == BTN_GOALS => {
            let pushups = store.get_current_pushups(user_id)?;
            let pullups = store.get_current_pullups(user_id)?;
            store.set_menu_state(user_id, MenuState::GoalsMenu)?;
            Ok(Reply {
                text: CHOOSE_GOAL.to_string(),
                keyboard: goals_keyboard(pushups, pullups),
            })
        }
        MenuState::GoalsMenu if text.starts_with("Подтягивания") => {
            let target = store.get_current_pullups(user_id)?;
            store.set_menu_state(user_id, MenuState::PullupsPrompt)?;
            Ok(Reply { text: pullups_prompt(target), keyboard: prompt_keyboard() })
        }
        MenuState::GoalsMenu if text.starts_with("Отжимания") => {
            let target = store.get_current_pushups(user_id)?;
            store.set_menu_state(user_id, MenuState::PushupsPrompt)?;
            Ok(Reply { text: pushups_prompt(target), keyboard: prompt_keyboard() })
        }
        MenuState::PullupsPrompt if text == BTN_DONE => {
            // Award exactly the pre-confirmation target, then raise the bar.
            let target = store.get_current_pullups(user_id)?;
            store.add_points(user_id, target)?;
            store.increase_pullups_goal(user_id, 1)?;
            store.set_menu_state(user_id, MenuState::MainMenu)?;
            Ok(Reply { text: congrats(target), keyboard: main_keyboard() })
        }
        MenuState::PushupsPrompt if text == BTN_DONE => {
            let target = store.get_current_pushups(user_id)?;
            store.add_points(user_id, target)?;
            store.increase_pushups_goal(user_id, 1)?;
            store.set_menu_state(user_id, MenuState::MainMenu)?;
            Ok(Reply { text: congrats(target), keyboard: main_keyboard() })
        }
        MenuState::PullupsPrompt | MenuState::PushupsPrompt if text == BTN_NEXT_TIME => {
            store.set_menu_state(user_id, MenuState::MainMenu)?;
            Ok(Reply { text: NEXT_TIME.to_string(), keyboard: main_keyboard() })
        }
        // Unmatched input: re-prompt with the current state's keyboard.
        _ => Ok(Reply {
            text: DID_NOT_UNDERSTAND.to_string(),
            keyboard: keyboard_for(store, user_id, state)?,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DEFAULT_PULLUPS, DEFAULT_PUSHUPS};

    const USER: i64 = 42;

    fn store() -> GoalStore {
        GoalStore::open_in_memory().unwrap()
    }

    fn button_texts(kb: &KeyboardMarkup) -> Vec<String> {
        kb.keyboard
            .iter()
            .flatten()
            .map(|b| b.text.clone())
            .collect()
    }

    #[test]
    fn test_start_greets_with_main_menu() {
        let store = store();
        let reply = respond(&store, USER, "/start").unwrap();
        assert_eq!(reply.text, GREETING);
        assert_eq!(button_texts(&reply.keyboard), vec![BTN_ACCOUNT, BTN_GOALS]);
        assert_eq!(store.menu_state(USER).unwrap(), MenuState::MainMenu);
    }

    #[test]
    fn test_account_shows_points_and_timestamp() {
        let store = store();
        store.add_points(USER, 7).unwrap();
        let reply = respond(&store, USER, "Личный Кабинет").unwrap();
        assert!(reply.text.contains("У тебя 7 баллов!"));
        assert!(reply.text.contains("дата и время:"));
        assert_eq!(store.menu_state(USER).unwrap(), MenuState::MainMenu);
    }

    #[test]
    fn test_goals_menu_shows_live_targets() {
        let store = store();
        store.increase_pullups_goal(USER, 1).unwrap();
        let reply = respond(&store, USER, "Мои цели").unwrap();
        assert_eq!(reply.text, CHOOSE_GOAL);
        let buttons = button_texts(&reply.keyboard);
        assert_eq!(buttons, vec!["Отжимания 10", "Подтягивания 6", BTN_BACK]);
        assert_eq!(store.menu_state(USER).unwrap(), MenuState::GoalsMenu);
    }

    #[test]
    fn test_pullups_button_prompts_with_target() {
        let store = store();
        store.set_menu_state(USER, MenuState::GoalsMenu).unwrap();
        let reply = respond(&store, USER, "Подтягивания 5").unwrap();
        assert!(reply.text.contains("5 Чистых подтягиваний"));
        assert_eq!(store.menu_state(USER).unwrap(), MenuState::PullupsPrompt);
        let buttons = button_texts(&reply.keyboard);
        assert_eq!(buttons, vec![BTN_DONE, BTN_NEXT_TIME, BTN_BACK]);
    }

    #[test]
    fn test_done_awards_target_and_raises_goal() {
        let store = store();
        store.set_menu_state(USER, MenuState::PullupsPrompt).unwrap();
        let reply = respond(&store, USER, "ГОТОВО").unwrap();
        assert!(reply.text.contains("заработал 5 баллов"));
        assert_eq!(store.get_points(USER).unwrap(), DEFAULT_PULLUPS);
        assert_eq!(store.get_current_pullups(USER).unwrap(), DEFAULT_PULLUPS + 1);
        assert_eq!(store.menu_state(USER).unwrap(), MenuState::MainMenu);
    }

    #[test]
    fn test_pushups_done_awards_pushup_target() {
        let store = store();
        store.set_menu_state(USER, MenuState::PushupsPrompt).unwrap();
        let reply = respond(&store, USER, "ГОТОВО").unwrap();
        assert!(reply.text.contains("заработал 10 баллов"));
        assert_eq!(store.get_points(USER).unwrap(), DEFAULT_PUSHUPS);
        assert_eq!(store.get_current_pushups(USER).unwrap(), DEFAULT_PUSHUPS + 1);
        assert_eq!(store.get_current_pullups(USER).unwrap(), DEFAULT_PULLUPS);
    }

    #[test]
    fn test_done_outside_prompt_does_not_award() {
        let store = store();
        let reply = respond(&store, USER, "ГОТОВО").unwrap();
        assert_eq!(reply.text, DID_NOT_UNDERSTAND);
        assert_eq!(store.get_points(USER).unwrap(), 0);
        assert_eq!(store.get_current_pullups(USER).unwrap(), DEFAULT_PULLUPS);
    }

    #[test]
    fn test_next_time_never_mutates() {
        let store = store();
        store.set_menu_state(USER, MenuState::PullupsPrompt).unwrap();
        let reply = respond(&store, USER, "В СЛЕДУЮЩИЙ РАЗ").unwrap();
        assert_eq!(reply.text, NEXT_TIME);
        assert_eq!(store.get_points(USER).unwrap(), 0);
        assert_eq!(store.get_current_pullups(USER).unwrap(), DEFAULT_PULLUPS);
        assert_eq!(store.menu_state(USER).unwrap(), MenuState::MainMenu);
    }

    #[test]
    fn test_back_returns_to_main_menu_from_any_state() {
        let store = store();
        for state in [MenuState::GoalsMenu, MenuState::PullupsPrompt, MenuState::PushupsPrompt] {
            store.set_menu_state(USER, state).unwrap();
            let reply = respond(&store, USER, "Назад").unwrap();
            assert_eq!(reply.text, HOW_CAN_I_HELP);
            assert_eq!(store.menu_state(USER).unwrap(), MenuState::MainMenu);
        }
    }

    #[test]
    fn test_unmatched_input_keeps_state_and_keyboard() {
        let store = store();
        store.set_menu_state(USER, MenuState::GoalsMenu).unwrap();
        let reply = respond(&store, USER, "что-то случайное").unwrap();
        assert_eq!(reply.text, DID_NOT_UNDERSTAND);
        assert_eq!(store.menu_state(USER).unwrap(), MenuState::GoalsMenu);
        let buttons = button_texts(&reply.keyboard);
        assert!(buttons[1].starts_with("Подтягивания"));
    }

    #[test]
    fn test_full_scenario_from_fresh_store() {
        let store = store();

        let reply = respond(&store, USER, "/start").unwrap();
        assert_eq!(reply.text, GREETING);

        let reply = respond(&store, USER, "Мои цели").unwrap();
        assert!(button_texts(&reply.keyboard).contains(&"Подтягивания 5".to_string()));

        let reply = respond(&store, USER, "Подтягивания 5").unwrap();
        assert!(reply.text.contains("5 Чистых подтягиваний"));

        let reply = respond(&store, USER, "ГОТОВО").unwrap();
        assert!(reply.text.contains("заработал 5 баллов"));
        assert_eq!(store.get_points(USER).unwrap(), 5);
        assert_eq!(store.get_current_pullups(USER).unwrap(), 6);

        // Second round awards the new target
        respond(&store, USER, "Мои цели").unwrap();
        let reply = respond(&store, USER, "Подтягивания 6").unwrap();
        assert!(reply.text.contains("6 Чистых подтягиваний"));
        respond(&store, USER, "ГОТОВО").unwrap();
        assert_eq!(store.get_points(USER).unwrap(), 11);
        assert_eq!(store.get_current_pullups(USER).unwrap(), 7);
    }

    #[test]
    fn test_menu_state_string_roundtrip() {
        for state in [
            MenuState::MainMenu,
            MenuState::GoalsMenu,
            MenuState::PullupsPrompt,
            MenuState::PushupsPrompt,
        ] {
            assert_eq!(MenuState::from_str(state.as_str()), state);
        }
        // Unknown strings fall back to the main menu
        assert_eq!(MenuState::from_str("garbage"), MenuState::MainMenu);
    }
}
