/// Planbook domain rules, shown to tool clients as server instructions and by
/// `get_rules`.
pub const RULES: &str = "\
1. A customer buys engagements. An engagement is a package of consulting hours (`packageHours`) \
sold to exactly one customer.\n\
2. A delivery plan scopes work against exactly one engagement. The engagement is chosen when the \
plan is created and never changes. Plan status is one of DRAFT, ACTIVE, COMPLETED, ARCHIVED \
(default DRAFT).\n\
3. A session is a schedulable unit of work inside one delivery plan. Its `plannedHours` draw on \
the engagement's package; `actualHours` are recorded after delivery and do not count against \
the package.\n\
4. Hour budget: the planned hours of all sessions in a delivery plan must not exceed the package \
hours of its engagement. Reaching the package exactly is allowed. The check runs when a session \
is created and when a session's `plannedHours` change; other edits skip it.\n\
5. Deleting a session never needs a budget check.\n\
6. Lowering an engagement's package hours is allowed even when plans already hold more. Such \
plans show negative remaining hours until sessions are trimmed.\n\
7. Hours are exact decimals. Pass them as JSON numbers or numeric strings (\"1.5\", \"2.25\"); \
negative values are refused.\n\
8. Library items are reusable session templates with default hours and topics. Creating a \
session from a library item copies its title, description, hours and topics.\n\
9. Topics tag sessions and library items. Deleting a topic untags everything that used it.\n\
\n\
## Workflow\n\
1. `list_engagements` or `get_delivery_plan` to see what is booked. The plan view includes an \
hour summary (package, planned, actual, remaining).\n\
2. Before adding or resizing a session, `check_allocation` answers whether the hours fit without \
writing anything.\n\
3. `create_session` / `update_session` repeat the check and refuse writes that would exceed the \
package, reporting the projected total.";
