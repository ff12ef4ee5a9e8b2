//! Rendered SQL text: escaping, where semantics and date normalization.

use rowbase::{
    DbConfig, MockExecutor, Orm, PivotSpec, Value, date, escape, params, pivot_table_name,
};

#[test]
fn injection_attempts_stay_inside_literals() {
    let sql = escape(
        "SELECT * FROM ::table WHERE ::column = :value",
        &params! {
            "table" => "user` WHERE 1=1; --",
            "column" => "name",
            "value" => "x' OR '1'='1",
        },
    );
    assert_eq!(
        sql,
        "SELECT * FROM `user`` WHERE 1=1; --` WHERE `name` = 'x\\' OR \\'1\\'=\\'1'"
    );
}

#[test]
fn lists_feed_in_clauses() {
    let sql = escape(
        "SELECT * FROM ::t WHERE ::c IN (:ids)",
        &params! { "t" => "post", "c" => "id", "ids" => vec![3, 1, 2] },
    );
    assert_eq!(sql, "SELECT * FROM `post` WHERE `id` IN (3, 1, 2)");
}

#[test]
fn pivot_names_are_deterministic() {
    assert_eq!(pivot_table_name("user", "role"), pivot_table_name("role", "user"));
    assert_eq!(pivot_table_name("user", "role"), "roleUser");
}

#[tokio::test]
async fn pivot_ddl_matches_pivot_joins() {
    let mock = MockExecutor::new();
    let db = Orm::builder()
        .database("main", DbConfig::new("app"))
        .executor(mock.clone())
        .build()
        .unwrap()
        .db("main")
        .unwrap();

    db.schema().pivot("user", "role", |_| {}).await.unwrap();
    assert_eq!(
        mock.last_sql().unwrap(),
        "CREATE TABLE `roleUser` (\
         `id` int(11) UNSIGNED AUTO_INCREMENT NOT NULL, PRIMARY KEY (`id`), \
         `roleId` int(11) UNSIGNED NOT NULL, \
         `userId` int(11) UNSIGNED NOT NULL)"
    );

    let sql = db
        .table("role")
        .set_pivot(PivotSpec::new("user", 3))
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT `role`.* FROM `role` \
         INNER JOIN `roleUser` ON `roleUser`.`roleId` = `role`.`id` \
         INNER JOIN `user` AS `this` ON `this`.`id` = `roleUser`.`userId` \
         WHERE `roleUser`.`userId` = 3"
    );
}

#[test]
fn date_inputs_normalize_to_one_format() {
    let cases = [
        ("2024-03-05 07:08:09", "2024-03-05 07:08:09"),
        ("2024-03-05T07:08:09", "2024-03-05 07:08:09"),
        ("3/5/2024", "2024-03-05 00:00:00"),
        ("03/05/2024 7:8 am", "2024-03-05 07:08:00"),
        ("12/25/2024 12:30:00 pm", "2024-12-25 12:30:00"),
        ("12/25/2024 12:30:00 am", "2024-12-25 00:30:00"),
    ];
    for (input, expected) in cases {
        assert_eq!(date::normalize(input).unwrap().as_deref(), Some(expected), "{input}");
    }
    assert_eq!(date::normalize("").unwrap(), None);
    assert!(date::normalize("next tuesday").is_err());
}

#[test]
fn builder_where_semantics() {
    let db = Orm::builder()
        .database("main", DbConfig::new("app"))
        .executor(MockExecutor::new())
        .build()
        .unwrap()
        .db("main")
        .unwrap();

    let sql = db
        .table("post")
        .where_eq("deletedAt", Value::Null)
        .where_op("title", "like", "%rust%")
        .where_in("status", ["draft", "review"])
        .where_op("views", ">=", 10)
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `post` WHERE `deletedAt` IS NULL AND `title` LIKE '%rust%' \
         AND `status` IN ('draft', 'review') AND `views` >= 10"
    );
}
