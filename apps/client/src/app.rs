//! Interactive menu

use std::io::{self, Write};

use entities::User;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::error;
use uuid::Uuid;

use crate::server_client::{ClientError, UsersClient};

const MENU: &str = "\
1. Get users
2. Get user by id
3. Get user by email
4. Insert
5. Update
6. Delete
7. Exit";

enum Flow {
    Continue,
    Exit,
}

/// Outcome of prompting for a value
enum Answer<T> {
    Value(T),
    /// Rejected locally; back to the menu
    Invalid,
    /// End of input
    Closed,
}

impl<T> Answer<T> {
    fn or_flow(self) -> Result<T, Flow> {
        match self {
            Answer::Value(value) => Ok(value),
            Answer::Invalid => Err(Flow::Continue),
            Answer::Closed => Err(Flow::Exit),
        }
    }
}

/// Numbered text menu driving a [`UsersClient`]
///
/// Reads one line per answer from `input`; end of input exits like option 7.
pub struct App<R, W> {
    client: UsersClient,
    input: R,
    output: W,
}

impl<R, W> App<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(client: UsersClient, input: R, output: W) -> Self {
        Self {
            client,
            input,
            output,
        }
    }

    /// Run the menu loop until the user exits or input ends
    pub async fn run(mut self) -> io::Result<()> {
        loop {
            writeln!(self.output, "{MENU}")?;
            let Some(choice) = self.prompt("> ").await? else {
                return Ok(());
            };

            let flow = match choice.as_str() {
                "1" => self.get_users().await?,
                "2" => self.get_user_by_id().await?,
                "3" => self.get_user_by_email().await?,
                "4" => self.insert().await?,
                "5" => self.update().await?,
                "6" => self.delete().await?,
                "7" => {
                    writeln!(self.output, "Exit...")?;
                    Flow::Exit
                }
                "" => Flow::Continue,
                other => {
                    writeln!(self.output, "Unknown option: {other}")?;
                    Flow::Continue
                }
            };

            if let Flow::Exit = flow {
                return Ok(());
            }
        }
    }

    /// Print `label` and read one trimmed line; `None` at end of input
    async fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Read and parse a user id
    async fn prompt_id(&mut self) -> io::Result<Answer<Uuid>> {
        let Some(raw) = self.prompt("User id: ").await? else {
            return Ok(Answer::Closed);
        };
        match Uuid::parse_str(&raw) {
            Ok(id) => Ok(Answer::Value(id)),
            Err(e) => {
                error!(op = "app.prompt_id", error = %e, "Invalid UUID format");
                writeln!(self.output, "Invalid id {raw:?}: {e}")?;
                Ok(Answer::Invalid)
            }
        }
    }

    /// Read email, password, role and nick for `id`
    async fn prompt_user(&mut self, id: Uuid) -> io::Result<Answer<User>> {
        let Some(email) = self.prompt("Email: ").await? else {
            return Ok(Answer::Closed);
        };
        let Some(password) = self.prompt("Password: ").await? else {
            return Ok(Answer::Closed);
        };
        let Some(role) = self.prompt("Role: ").await? else {
            return Ok(Answer::Closed);
        };
        let Some(nick) = self.prompt("Nick: ").await? else {
            return Ok(Answer::Closed);
        };
        Ok(Answer::Value(User::with_id(id, email, password, role, nick)))
    }

    fn report(&mut self, op: &str, err: &ClientError) -> io::Result<Flow> {
        error!(op, error = %err, "Request failed");
        writeln!(self.output, "Error: {err}")?;
        Ok(Flow::Continue)
    }

    async fn get_users(&mut self) -> io::Result<Flow> {
        match self.client.get_users().await {
            Ok(users) => {
                writeln!(self.output, "Users:")?;
                for user in users {
                    writeln!(self.output, "{user}")?;
                }
                Ok(Flow::Continue)
            }
            Err(e) => self.report("app.get_users", &e),
        }
    }

    async fn get_user_by_id(&mut self) -> io::Result<Flow> {
        let id = match self.prompt_id().await?.or_flow() {
            Ok(id) => id,
            Err(flow) => return Ok(flow),
        };

        match self.client.get_user_by_id(id).await {
            Ok(user) => {
                writeln!(self.output, "{user}")?;
                Ok(Flow::Continue)
            }
            Err(e) => self.report("app.get_user_by_id", &e),
        }
    }

    async fn get_user_by_email(&mut self) -> io::Result<Flow> {
        let Some(email) = self.prompt("Email: ").await? else {
            return Ok(Flow::Exit);
        };

        match self.client.get_user_by_email(&email).await {
            Ok(user) => {
                writeln!(self.output, "{user}")?;
                Ok(Flow::Continue)
            }
            Err(e) => self.report("app.get_user_by_email", &e),
        }
    }

    async fn insert(&mut self) -> io::Result<Flow> {
        let user = match self.prompt_user(Uuid::new_v4()).await?.or_flow() {
            Ok(user) => user,
            Err(flow) => return Ok(flow),
        };

        match self.client.insert(&user).await {
            Ok(()) => {
                writeln!(self.output, "User inserted: {}", user.id)?;
                Ok(Flow::Continue)
            }
            Err(e) => self.report("app.insert", &e),
        }
    }

    async fn update(&mut self) -> io::Result<Flow> {
        let id = match self.prompt_id().await?.or_flow() {
            Ok(id) => id,
            Err(flow) => return Ok(flow),
        };
        let user = match self.prompt_user(id).await?.or_flow() {
            Ok(user) => user,
            Err(flow) => return Ok(flow),
        };

        match self.client.update(id, &user).await {
            Ok(()) => {
                writeln!(self.output, "User updated: {id}")?;
                Ok(Flow::Continue)
            }
            Err(e) => self.report("app.update", &e),
        }
    }

    async fn delete(&mut self) -> io::Result<Flow> {
        let id = match self.prompt_id().await?.or_flow() {
            Ok(id) => id,
            Err(flow) => return Ok(flow),
        };

        match self.client.delete(id).await {
            Ok(user) => {
                writeln!(self.output, "User deleted: {user}")?;
                Ok(Flow::Continue)
            }
            Err(e) => self.report("app.delete", &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn run(input: &'static str) -> String {
        let client = UsersClient::new("http://127.0.0.1:1", Duration::from_millis(500));
        let mut output = Vec::new();
        App::new(client, input.as_bytes(), &mut output)
            .run()
            .await
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[tokio::test]
    async fn test_exit_option() {
        let output = run("7\n").await;
        assert!(output.contains("1. Get users"));
        assert!(output.ends_with("Exit...\n"));
    }

    #[tokio::test]
    async fn test_end_of_input_exits() {
        let output = run("").await;
        assert!(output.contains("7. Exit"));
    }

    #[tokio::test]
    async fn test_unknown_option() {
        let output = run("9\n7\n").await;
        assert!(output.contains("Unknown option: 9"));
    }

    #[tokio::test]
    async fn test_invalid_id_is_rejected_locally() {
        let output = run("2\nnot-a-uuid\n7\n").await;
        assert!(output.contains("Invalid id \"not-a-uuid\""));
        assert!(!output.contains("Error:"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_reported() {
        let output = run("1\n7\n").await;
        assert!(output.contains("Error: Network error"));
        assert!(output.ends_with("Exit...\n"));
    }
}
