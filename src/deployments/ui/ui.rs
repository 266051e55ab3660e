use provenance_deployments::onchain::TransactionStatus;

use super::App;
use tui::{
    backend::Backend,
    layout::{Constraint, Rect},
    style::{Color, Style},
    widgets::{Block, Cell, Row, Table},
    Frame,
};

pub fn draw<B: Backend>(f: &mut Frame<B>, app: &mut App) {
    draw_transactions_status(f, app, f.size());
}

fn draw_transactions_status<B>(f: &mut Frame<B>, app: &mut App, area: Rect)
where
    B: Backend,
{
    let rows = app.transactions.items.iter().map(|tx| {
        let (status, comment) = match &tx.status {
            TransactionStatus::Queued => ("🟪", "Transaction queued".to_string()),
            TransactionStatus::Prepared => ("🟦", "Transaction prepared".to_string()),
            TransactionStatus::Broadcasted(tx_hash) => {
                ("🟨", format!("Transaction broadcasted ({})", tx_hash))
            }
            TransactionStatus::Confirmed(receipt) => match &receipt.contract_address {
                Some(address) => ("🟩", format!("Contract deployed at {}", address)),
                None => ("🟩", "Transaction confirmed".to_string()),
            },
            TransactionStatus::Error(message) => ("🟥", message.to_string()),
        };

        Row::new(vec![
            Cell::from(status),
            Cell::from(tx.name.to_string()),
            Cell::from(comment),
        ])
        .height(1)
        .bottom_margin(0)
    });

    let t = Table::new(rows)
        .block(Block::default().title(format!("Broadcasting transactions to {}", app.node_url)))
        .style(Style::default().fg(Color::White))
        .widths(&[
            Constraint::Length(3),
            Constraint::Length(60),
            Constraint::Length(120),
        ]);
    f.render_widget(t, area);
}
