//! 终端交互壳层

use std::io::Write;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::commands::{self, AppState};
use crate::error::{Error, Result};
use crate::formats::BookFormat;
use crate::models::BookRecord;
use crate::shell::{ContextMenu, ShellBridge, ShellMessage};
use crate::ui;

const HELP: &str = "\
命令:
  import <路径>          导入 .epub / .txt
  list                   显示书库
  open <序号>            打开书籍
  next | prev            翻页
  page                   重新显示当前页
  toc | goto <序号>      目录与跳转
  bookmark               在当前位置添加书签
  bookmarks              显示书签
  jump <序号>            跳转到书签
  rmbookmark <序号>      删除书签
  ask <问题>             向 AI 提问
  select <文本>          选中文本（弹出右键菜单）
  menu <序号>            书籍右键菜单
  pick <序号>            选择右键菜单项
  theme <light|dark>     主题
  font <字号>            字号
  config <url|key|model> <值>
  test-ai                测试 AI 连接
  close                  关闭当前书籍
  quit                   退出";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Repl<W: Write> {
    state: AppState,
    bridge: ShellBridge,
    /// 最近一次显示的书库，序号从 1 开始
    library: Vec<BookRecord>,
    menu: Option<ContextMenu>,
    out: W,
}

impl<W: Write> Repl<W> {
    pub fn new(state: AppState, out: W) -> Self {
        Self {
            state,
            bridge: ShellBridge::new(),
            library: Vec::new(),
            menu: None,
            out,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn say(&mut self, text: impl AsRef<str>) {
        if let Err(err) = writeln!(self.out, "{}", text.as_ref()) {
            warn!("Failed to write output: {err}");
        }
    }

    fn report(&mut self, err: &Error) {
        if !err.is_precondition() {
            warn!("Command failed: {err}");
        }
        self.say(format!("错误: {}", err));
    }

    /// 主循环：逐行读取标准输入直到 quit 或输入结束
    pub async fn run(&mut self) -> Result<()> {
        if !self.state.storage_ready() {
            self.say("书库不可用，导入功能已禁用。");
        }
        if self.state.session.current_book().is_none() {
            self.show_library().await;
        }
        self.say("输入 help 查看命令。");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            self.prompt();
            let Some(line) = lines.next_line().await? else {
                break;
            };
            if self.handle_line(&line).await == Flow::Quit {
                break;
            }
        }
        self.shutdown().await;
        Ok(())
    }

    fn prompt(&mut self) {
        let _ = write!(self.out, "> ");
        let _ = self.out.flush();
    }

    /// 等待后台写入完成后再退出
    pub async fn shutdown(&mut self) {
        self.state.session.settle().await;
        self.state.session.close();
        debug!("Shell shut down");
    }

    /// 处理一行输入，随后处理期间产生的宿主消息
    pub async fn handle_line(&mut self, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        let result = match command {
            "quit" | "exit" | "q" => return Flow::Quit,
            "help" | "h" => {
                self.say(HELP);
                Ok(())
            }
            "import" => self.import(arg).await,
            "list" | "ls" => {
                self.show_library().await;
                Ok(())
            }
            "open" => self.open(arg).await,
            "next" | "n" => {
                self.turn(true);
                Ok(())
            }
            "prev" | "p" => {
                self.turn(false);
                Ok(())
            }
            "page" => {
                self.show_page();
                Ok(())
            }
            "toc" => {
                self.show_toc();
                Ok(())
            }
            "goto" => parse_index(arg)
                .and_then(|i| commands::goto_toc_entry(&mut self.state, i))
                .map(|_| self.show_page()),
            "bookmark" | "bm" => self.add_bookmark().await,
            "bookmarks" => {
                self.show_bookmarks();
                Ok(())
            }
            "jump" => self.jump(arg).await,
            "rmbookmark" => self.delete_bookmark(arg).await,
            "ask" => self.ask(arg).await,
            "select" => {
                self.bridge.send(ShellMessage::ShowSelectionMenu(arg.to_string()));
                Ok(())
            }
            "menu" => self.book_menu(arg),
            "pick" => self.pick(arg),
            "theme" => commands::set_theme(&mut self.state, arg).map(|theme| {
                self.say(format!("主题: {}", theme));
                self.show_page();
            }),
            "font" => commands::set_font_size(&mut self.state, arg).map(|size| {
                self.say(format!("字号: {}px", size));
                self.show_page();
            }),
            "config" => self.config(arg),
            "test-ai" => self.test_ai().await,
            "close" => {
                self.state.session.close();
                self.show_library().await;
                Ok(())
            }
            other => {
                self.say(format!("未知命令: {}（输入 help 查看命令）", other));
                Ok(())
            }
        };
        if let Err(err) = result {
            self.report(&err);
        }

        self.dispatch_messages().await;
        Flow::Continue
    }

    async fn dispatch_messages(&mut self) {
        for message in self.bridge.drain() {
            match message {
                ShellMessage::ShowSelectionMenu(text) => {
                    self.show_menu(ContextMenu::Selection(text))
                }
                ShellMessage::ShowBookMenu(id) => self.show_menu(ContextMenu::Book(id)),
                ShellMessage::SummarizeWithAi(text) => {
                    self.say("思考中...");
                    match commands::summarize_selection(&self.state, &text).await {
                        Ok(answer) => self.say(format!("回答:\n\n{}", answer)),
                        Err(err) => self.report(&err),
                    }
                }
                ShellMessage::DeleteBook(id) => {
                    match commands::delete_book(&mut self.state, id).await {
                        Ok(()) => self.show_library().await,
                        Err(err) => self.report(&err),
                    }
                }
            }
        }
    }

    fn show_menu(&mut self, menu: ContextMenu) {
        self.say(format!("{}", menu));
        self.menu = Some(menu);
    }

    async fn show_library(&mut self) {
        match commands::load_library(&mut self.state).await {
            Ok((books, covers)) => {
                let view = ui::render_library(&books, &covers);
                let text = view.to_string();
                self.library = books;
                self.say(text);
            }
            Err(err) => self.report(&err),
        }
    }

    fn show_page(&mut self) {
        match self.state.session.current_page() {
            Some(view) => self.say(ui::render_page(&view)),
            None => self.say("没有打开的书籍。"),
        }
    }

    fn show_toc(&mut self) {
        let is_epub = self
            .state
            .session
            .current_book()
            .is_some_and(|b| b.book_type == BookFormat::Epub);
        match self.state.session.sidebar().toc {
            Some(toc) => self.say(toc.to_string()),
            None if is_epub => self.say(ui::render_toc(&[]).to_string()),
            None => self.say("目录仅在 EPUB 书籍中可用。"),
        }
    }

    fn show_bookmarks(&mut self) {
        match self.state.session.sidebar().bookmarks {
            Some(view) => self.say(view.to_string()),
            None => self.say("没有书签。"),
        }
    }

    fn library_book(&self, arg: &str) -> Result<i64> {
        let index = parse_index(arg)?;
        self.library
            .get(index)
            .and_then(|b| b.id)
            .ok_or_else(|| {
                Error::precondition(format!("书库中没有第 {} 本书。", index + 1))
            })
    }

    async fn import(&mut self, arg: &str) -> Result<()> {
        if arg.is_empty() {
            return Err(Error::precondition("请指定要导入的文件。"));
        }
        let record = commands::import_book(&self.state, Path::new(arg)).await?;
        self.say(format!("已导入《{}》", record.name));
        self.show_library().await;
        Ok(())
    }

    /// 启动参数里的书籍：导入后直接打开
    pub async fn open_file(&mut self, path: &Path) -> Result<()> {
        let record = commands::import_book(&self.state, path).await?;
        let id = record
            .id
            .ok_or_else(|| Error::Read(format!("《{}》没有分配 id", record.name)))?;
        self.open_id(id).await
    }

    async fn open(&mut self, arg: &str) -> Result<()> {
        let id = self.library_book(arg)?;
        self.open_id(id).await
    }

    async fn open_id(&mut self, id: i64) -> Result<()> {
        match commands::open_book(&mut self.state, id).await {
            Ok(view) => {
                self.say(ui::render_page(&view));
                Ok(())
            }
            Err(err @ Error::Parse(_)) => {
                warn!("Error loading EPUB: {err}");
                self.say(ui::render_load_error(&err.to_string()));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn turn(&mut self, forward: bool) {
        if self.state.session.current_book().is_none() {
            self.say("没有打开的书籍。");
            return;
        }
        let moved = if forward {
            self.state.session.next()
        } else {
            self.state.session.prev()
        };
        if moved {
            self.show_page();
        } else if forward {
            self.say("已经是最后一页。");
        } else {
            self.say("已经是第一页。");
        }
    }

    async fn add_bookmark(&mut self) -> Result<()> {
        let bookmark = commands::add_bookmark(&mut self.state).await?;
        self.say(format!("已添加书签: {}", bookmark.label));
        self.show_bookmarks();
        Ok(())
    }

    async fn jump(&mut self, arg: &str) -> Result<()> {
        let index = parse_index(arg)?;
        commands::goto_bookmark(&mut self.state, index).await?;
        self.show_page();
        Ok(())
    }

    async fn delete_bookmark(&mut self, arg: &str) -> Result<()> {
        let index = parse_index(arg)?;
        let removed = commands::delete_bookmark(&mut self.state, index).await?;
        self.say(format!("已删除书签: {}", removed.label));
        self.show_bookmarks();
        Ok(())
    }

    async fn ask(&mut self, question: &str) -> Result<()> {
        self.say("思考中...");
        let answer = commands::ask_question(&self.state, question).await?;
        self.say(format!("回答:\n\n{}", answer));
        Ok(())
    }

    fn book_menu(&mut self, arg: &str) -> Result<()> {
        let id = self.library_book(arg)?;
        self.bridge.send(ShellMessage::ShowBookMenu(id));
        Ok(())
    }

    fn pick(&mut self, arg: &str) -> Result<()> {
        let index = parse_index(arg)?;
        let menu = self
            .menu
            .take()
            .ok_or_else(|| Error::precondition("没有打开的菜单。"))?;
        let message = menu
            .choose(index)
            .ok_or_else(|| {
                Error::precondition(format!("菜单中没有第 {} 项。", index + 1))
            })?;
        self.bridge.send(message);
        Ok(())
    }

    fn config(&mut self, arg: &str) -> Result<()> {
        let (field, value) = arg.split_once(char::is_whitespace).unwrap_or((arg, ""));
        commands::set_ai_config(&mut self.state, field, value)?;
        self.say("设置已保存。");
        Ok(())
    }

    async fn test_ai(&mut self) -> Result<()> {
        let count = commands::test_ai_connection(&self.state).await?;
        self.say(format!("连接成功，可用模型 {} 个。", count));
        Ok(())
    }
}

/// 用户输入的序号从 1 开始
fn parse_index(arg: &str) -> Result<usize> {
    match arg.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(Error::precondition(format!("无效的序号: {}", arg))),
    }
}
