//! Initial schema: exchange rates, transactions, line items, daily statements.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(INITIAL_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS daily_statements CASCADE;
             DROP TABLE IF EXISTS line_items CASCADE;
             DROP TABLE IF EXISTS transactions CASCADE;
             DROP TABLE IF EXISTS exchange_rates CASCADE;
             DROP TYPE IF EXISTS payment_type;
             DROP TYPE IF EXISTS payment_status;
             DROP TYPE IF EXISTS direction;",
        )
        .await?;
        Ok(())
    }
}

const INITIAL_SQL: &str = r"
-- Enum types
CREATE TYPE direction AS ENUM ('credit', 'debit');
CREATE TYPE payment_status AS ENUM ('pending', 'paid', 'cancelled', 'overdue');
CREATE TYPE payment_type AS ENUM ('cash', 'deferred', 'installment');

-- One exchange rate per calendar date, last write wins
CREATE TABLE exchange_rates (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    date DATE NOT NULL UNIQUE,
    rate NUMERIC(10, 4) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_rate_positive CHECK (rate > 0)
);

-- Transactions carry the rate snapshot and the derived converted amount
CREATE TABLE transactions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    date DATE NOT NULL,
    description VARCHAR(500) NOT NULL,
    local_amount NUMERIC(15, 2) NOT NULL,
    exchange_rate NUMERIC(10, 4) NOT NULL,
    converted_amount NUMERIC(15, 2) NOT NULL,
    direction direction NOT NULL,
    payment_status payment_status NOT NULL,
    payment_type payment_type NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_exchange_rate_positive CHECK (exchange_rate > 0)
);

-- The aggregator re-sums by date on every mutation
CREATE INDEX idx_transactions_date ON transactions(date);
CREATE INDEX idx_transactions_date_direction ON transactions(date, direction);

-- Line items cannot outlive their owning transaction
CREATE TABLE line_items (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    transaction_id UUID NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
    description VARCHAR(255) NOT NULL,
    quantity INTEGER NOT NULL,
    unit_price NUMERIC(10, 2) NOT NULL,
    total NUMERIC(15, 2) NOT NULL,
    CONSTRAINT chk_quantity_positive CHECK (quantity > 0)
);

CREATE INDEX idx_line_items_transaction ON line_items(transaction_id);

-- Derived day-indexed statements; the unique date turns a concurrent
-- insert race into a constraint violation the aggregator retries on
CREATE TABLE daily_statements (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    date DATE NOT NULL UNIQUE,
    total_credits NUMERIC(15, 2) NOT NULL DEFAULT 0,
    total_debits NUMERIC(15, 2) NOT NULL DEFAULT 0,
    day_balance NUMERIC(15, 2) NOT NULL DEFAULT 0,
    accumulated_balance NUMERIC(15, 2) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";
